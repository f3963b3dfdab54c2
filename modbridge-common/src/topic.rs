/// Default topic prefix, matching Home Assistant's MQTT discovery prefix.
pub const DEFAULT_BASE_TOPIC: &str = "homeassistant";

/// Component segment used for every published entity.
pub const COMPONENT: &str = "sensor";

/// Builder for the MQTT topics a bridge publishes to.
///
/// Topics follow the pattern:
/// `<base_topic>/sensor/<device>/<slug>/<config|state>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    base: String,
}

impl Default for TopicBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC)
    }
}

impl TopicBuilder {
    /// Create a builder rooted at `base`. Trailing slashes are dropped.
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// The configured base topic.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Topic prefix shared by an entity's discovery and state topics.
    ///
    /// # Example
    /// ```
    /// use modbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("homeassistant");
    /// assert_eq!(topics.entity("inv1", "power"), "homeassistant/sensor/inv1/power");
    /// ```
    pub fn entity(&self, device: &str, slug: &str) -> String {
        format!("{}/{}/{}/{}", self.base, COMPONENT, device, slug)
    }

    /// Retained discovery topic for an entity.
    ///
    /// # Example
    /// ```
    /// use modbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("homeassistant");
    /// assert_eq!(
    ///     topics.discovery("inv1", "100"),
    ///     "homeassistant/sensor/inv1/100/config"
    /// );
    /// ```
    pub fn discovery(&self, device: &str, slug: &str) -> String {
        format!("{}/config", self.entity(device, slug))
    }

    /// Live value topic for an entity.
    ///
    /// # Example
    /// ```
    /// use modbridge_common::topic::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("homeassistant");
    /// assert_eq!(
    ///     topics.state("inv1", "100"),
    ///     "homeassistant/sensor/inv1/100/state"
    /// );
    /// ```
    pub fn state(&self, device: &str, slug: &str) -> String {
        format!("{}/state", self.entity(device, slug))
    }
}
