use fibre_di::{resolve, ContainerBuilder, Module};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Define a service that depends on the abstraction
struct ReportService {
  logger: Arc<dyn Logger>,
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    self.logger.log("Finished report generation.");
  }
}

fn main() {
  let mut module = Module::new();

  // The container stores an Arc<ConsoleLogger> and serves it as Arc<dyn Logger> too.
  module
    .single(|_| Ok(ConsoleLogger))
    .bind::<dyn Logger>(|it| it);

  // The factory resolves its own dependency through the context.
  module.single(|ctx| {
    Ok(ReportService {
      logger: ctx.get::<dyn Logger>()?,
    })
  });

  ContainerBuilder::new()
    .module(module)
    .start()
    .expect("global container should start");

  println!("Resolving the high-level service...");
  let report_service = resolve!(ReportService);
  report_service.generate_report();

  fibre_di::stop();
}
