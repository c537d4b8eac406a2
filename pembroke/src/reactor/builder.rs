use super::Reactor;
use super::context::LoopContext;
use super::poller::Poller;
use crate::error::ConfigurationError;

use std::fmt;

/// A backend capability that can be requested when building a reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Edge-triggered readiness notification.
    EdgeTrigger,
    /// Readiness reported through file descriptors.
    FileDescriptor,
    /// Detection of a peer closing its end before all data is read.
    EarlyClose,
    /// Dispatch cost independent of the number of registered events.
    OrderOneTrigger,
}

impl Feature {
    /// Every feature, in the order they are negotiated with the backend.
    pub const ALL: [Feature; 4] = [
        Feature::EdgeTrigger,
        Feature::FileDescriptor,
        Feature::EarlyClose,
        Feature::OrderOneTrigger,
    ];
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::EdgeTrigger => "edge-trigger",
            Feature::FileDescriptor => "file-descriptor",
            Feature::EarlyClose => "early-close",
            Feature::OrderOneTrigger => "O(1) trigger",
        };
        f.write_str(name)
    }
}

/// A set of [`Feature`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub edge_trigger: bool,
    pub file_descriptors: bool,
    pub early_close: bool,
    pub order_one_trigger: bool,
}

impl Features {
    /// Every feature requested.
    pub const fn all() -> Self {
        Self {
            edge_trigger: true,
            file_descriptors: true,
            early_close: true,
            order_one_trigger: true,
        }
    }

    /// No feature requested.
    pub const fn none() -> Self {
        Self {
            edge_trigger: false,
            file_descriptors: false,
            early_close: false,
            order_one_trigger: false,
        }
    }

    /// Returns `true` if `feature` is part of the set.
    pub fn contains(&self, feature: Feature) -> bool {
        match feature {
            Feature::EdgeTrigger => self.edge_trigger,
            Feature::FileDescriptor => self.file_descriptors,
            Feature::EarlyClose => self.early_close,
            Feature::OrderOneTrigger => self.order_one_trigger,
        }
    }

    fn set(&mut self, feature: Feature, val: bool) {
        match feature {
            Feature::EdgeTrigger => self.edge_trigger = val,
            Feature::FileDescriptor => self.file_descriptors = val,
            Feature::EarlyClose => self.early_close = val,
            Feature::OrderOneTrigger => self.order_one_trigger = val,
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::all()
    }
}

/// Builder for configuring and creating a [`Reactor`].
///
/// Every backend feature is requested by default. Each requested feature
/// is forwarded to the backend on its own, and the first one the backend
/// rejects aborts construction with [`ConfigurationError::Unsupported`].
///
/// # Examples
///
/// ```rust,no_run
/// let reactor = pembroke::reactor()
///     .require_early_close_support(false)
///     .build()
///     .expect("reactor");
/// ```
#[derive(Debug, Clone)]
pub struct ReactorBuilder {
    /// Features requested from the backend.
    features: Features,
}

impl ReactorBuilder {
    /// Creates a new `ReactorBuilder` requesting every feature.
    pub fn new() -> Self {
        Self {
            features: Features::all(),
        }
    }

    /// Requests (or stops requesting) edge-triggered notification.
    pub fn require_edge_trigger_support(self, val: bool) -> Self {
        self.require(Feature::EdgeTrigger, val)
    }

    /// Requests (or stops requesting) file-descriptor driven readiness.
    pub fn require_file_descriptor_support(self, val: bool) -> Self {
        self.require(Feature::FileDescriptor, val)
    }

    /// Requests (or stops requesting) early-close detection.
    pub fn require_early_close_support(self, val: bool) -> Self {
        self.require(Feature::EarlyClose, val)
    }

    /// Requests (or stops requesting) O(1) dispatch.
    pub fn require_order_one_trigger_support(self, val: bool) -> Self {
        self.require(Feature::OrderOneTrigger, val)
    }

    fn require(mut self, feature: Feature, val: bool) -> Self {
        self.features.set(feature, val);
        self
    }

    /// Features this builder will request.
    pub fn requested(&self) -> Features {
        self.features
    }

    /// Builds the reactor with the configured options.
    ///
    /// This creates the loop context and negotiates every requested
    /// feature with it.
    pub fn build(self) -> Result<Reactor, ConfigurationError> {
        let mut poller = Poller::new().map_err(ConfigurationError::Context)?;
        let features = negotiate(self.features, |feature| poller.require(feature))?;

        log::debug!(target: "pembroke::reactor", "Reactor built with features {features:?}");

        Ok(Reactor::from_context(LoopContext::new(poller, features)))
    }
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a [`ReactorBuilder`] with the default configuration.
///
/// ```rust,no_run
/// let reactor = pembroke::reactor()
///     .require_edge_trigger_support(true)
///     .require_order_one_trigger_support(true)
///     .build()
///     .expect("reactor");
/// ```
pub fn reactor() -> ReactorBuilder {
    ReactorBuilder::new()
}

/// Forwards each requested feature to `probe`, one at a time.
fn negotiate(
    requested: Features,
    mut probe: impl FnMut(Feature) -> bool,
) -> Result<Features, ConfigurationError> {
    for feature in Feature::ALL {
        if requested.contains(feature) && !probe(feature) {
            return Err(ConfigurationError::Unsupported(feature));
        }
    }

    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::{Feature, Features, negotiate};
    use crate::error::ConfigurationError;

    #[test]
    fn rejected_feature_aborts_negotiation() {
        let result = negotiate(Features::all(), |feature| feature != Feature::EarlyClose);

        assert!(matches!(
            result,
            Err(ConfigurationError::Unsupported(Feature::EarlyClose))
        ));
    }

    #[test]
    fn unrequested_features_are_not_probed() {
        let mut probed = Vec::new();
        let requested = Features {
            edge_trigger: true,
            ..Features::none()
        };

        let result = negotiate(requested, |feature| {
            probed.push(feature);
            true
        });

        assert_eq!(result.ok(), Some(requested));
        assert_eq!(probed, vec![Feature::EdgeTrigger]);
    }

    #[test]
    fn each_feature_is_probed_individually() {
        let mut probed = Vec::new();
        let result = negotiate(Features::all(), |feature| {
            probed.push(feature);
            true
        });

        assert!(result.is_ok());
        assert_eq!(probed, Feature::ALL.to_vec());
    }
}
