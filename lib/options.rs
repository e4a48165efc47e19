use serde::{Deserialize, Serialize};
use std::default;

/// Options which change the behavior of region and assignment converters.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Options {
    cache: bool,
}

impl Options {
    /// Create a new set of Options with the default settings.
    pub fn new() -> Options {
        Options::default()
    }

    /// Set the value of the, "Cache," option.
    pub fn set_cache(&mut self, cache: bool) {
        self.cache = cache;
    }

    /// Whether converters memoize their results per function and address.
    ///
    /// Caching is off by default. When turned on, each converter keeps its
    /// own cache for its whole lifetime. There is no invalidation: the caller
    /// must not change the instructions of a function, or re-run the stack
    /// height analysis with a different configuration, while a converter
    /// holding results for that function is alive.
    pub fn cache(&self) -> bool {
        self.cache
    }
}

/// Create your options with the builder pattern.
///
/// For more details on the options, see `Options`
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder for converter options.
    pub fn new() -> OptionsBuilder {
        OptionsBuilder {
            options: Options::default(),
        }
    }

    /// Set the, "Cache," option. By default this is false.
    pub fn cache(mut self, cache: bool) -> OptionsBuilder {
        self.options.cache = cache;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

impl default::Default for OptionsBuilder {
    fn default() -> OptionsBuilder {
        OptionsBuilder::new()
    }
}

#[test]
fn options_builder() {
    assert!(!Options::new().cache());
    assert!(OptionsBuilder::new().cache(true).build().cache());

    let mut options = Options::new();
    options.set_cache(true);
    assert_eq!(options, OptionsBuilder::default().cache(true).build());
}
