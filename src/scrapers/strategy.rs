use tracing::{debug, trace};

/// One attempt at producing a value from some input.
///
/// The lifetime ties the output to the input so that strategies can hand back
/// borrowed DOM nodes (card location) as well as owned strings (fields).
pub trait Strategy<'a, I: ?Sized> {
    type Output;

    fn attempt(&self, input: &'a I) -> Option<Self::Output>;
}

/// A successful chain resolution and the index of the step that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<T> {
    pub step: usize,
    pub value: T,
}

/// Ordered list of strategies, evaluated until the first one succeeds
#[derive(Debug, Clone)]
pub struct StrategyChain<S> {
    name: &'static str,
    steps: Vec<S>,
}

impl<S> StrategyChain<S> {
    pub fn new(name: &'static str, steps: Vec<S>) -> Self {
        Self { name, steps }
    }

    /// Run each step in order and return the first success.
    ///
    /// A miss is not an error; callers decide how to degrade.
    pub fn resolve<'a, I>(&self, input: &'a I) -> Option<Hit<S::Output>>
    where
        I: ?Sized + 'a,
        S: Strategy<'a, I>,
    {
        for (step, strategy) in self.steps.iter().enumerate() {
            if let Some(value) = strategy.attempt(input) {
                trace!(chain = self.name, step, "strategy matched");
                return Some(Hit { step, value });
            }
        }
        debug!(chain = self.name, steps = self.steps.len(), "no strategy matched");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finds the first word starting with a prefix
    struct Prefix(&'static str);

    impl<'a> Strategy<'a, str> for Prefix {
        type Output = &'a str;

        fn attempt(&self, input: &'a str) -> Option<&'a str> {
            input.split_whitespace().find(|w| w.starts_with(self.0))
        }
    }

    #[test]
    fn first_successful_step_wins() {
        let chain = StrategyChain::new("word", vec![Prefix("zz"), Prefix("b"), Prefix("a")]);
        let hit = chain.resolve("alpha beta gamma").expect("should match");
        assert_eq!(hit.step, 1);
        assert_eq!(hit.value, "beta");
    }

    #[test]
    fn exhausted_chain_yields_none() {
        let chain = StrategyChain::new("word", vec![Prefix("x"), Prefix("y")]);
        assert!(chain.resolve("alpha beta").is_none());
    }
}
