pub mod commands;

use crate::errors::Result;
use crate::universe::Universe;
use async_trait::async_trait;
use tracing::{error, info};

/// A dispatchable request. Handlers are registered at compile time by
/// implementing this trait; the mediator wraps every dispatch in the fixed
/// pipeline: log "Executing", validate, handle, log the outcome.
#[async_trait]
pub trait Command: Send + std::fmt::Debug {
    type Output: Send;

    fn name(&self) -> &'static str;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Self::Output>;
}

pub struct CommandContext {
    pub universe: Universe,
}

/// Stateless dispatcher; every call runs the same middleware order.
pub struct Mediator {
    ctx: CommandContext,
}

impl Mediator {
    pub fn new(universe: Universe) -> Mediator {
        Mediator { ctx: CommandContext { universe } }
    }

    pub fn universe(&self) -> &Universe {
        &self.ctx.universe
    }

    pub async fn send<C: Command>(&self, command: C) -> Result<C::Output> {
        let name = command.name();
        info!("Executing {}", name);
        let result = async {
            command.validate()?;
            command.handle(&self.ctx).await
        }
        .await;
        match &result {
            Ok(_) => info!("Completed {}", name),
            Err(e) => error!("Failed {}: {}", name, e),
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::Error;
    use crate::gateway::ApiGateway;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Probe {
        valid: bool,
        handled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Command for Probe {
        type Output = u32;

        fn name(&self) -> &'static str {
            "Probe"
        }

        fn validate(&self) -> Result<()> {
            if self.valid {
                Ok(())
            } else {
                Err(Error::InvalidParams("probe rejected".to_string()))
            }
        }

        async fn handle(self, _ctx: &CommandContext) -> Result<u32> {
            self.handled.store(true, Ordering::SeqCst);
            Ok(7)
        }
    }

    fn mediator() -> Mediator {
        let gateway = Arc::new(ApiGateway::with_settings(
            "http://127.0.0.1:9",
            100,
            0,
            std::time::Duration::from_millis(1),
            5,
            std::time::Duration::from_secs(60),
        ));
        Mediator::new(Universe::new(&gateway, None))
    }

    #[tokio::test]
    async fn test_handler_runs_after_validation() {
        let handled = Arc::new(AtomicBool::new(false));
        let result = mediator()
            .send(Probe { valid: true, handled: handled.clone() })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert!(handled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_validation_failure_short_circuits() {
        let handled = Arc::new(AtomicBool::new(false));
        let err = mediator()
            .send(Probe { valid: false, handled: handled.clone() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParams");
        assert!(!handled.load(Ordering::SeqCst), "handler must not run");
    }
}
