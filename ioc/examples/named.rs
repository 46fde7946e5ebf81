use fibre_di::{resolve, ContainerBuilder, Module};
use std::sync::Arc;

// --- Abstraction and Implementations ---
trait MessageSender: Send + Sync {
  fn send(&self, to: &str, message: &str) -> String;
}

struct EmailSender;
impl MessageSender for EmailSender {
  fn send(&self, to: &str, message: &str) -> String {
    format!("Sending email to {}: '{}'", to, message)
  }
}

struct SmsSender;
impl MessageSender for SmsSender {
  fn send(&self, to: &str, message: &str) -> String {
    format!("Sending SMS to {}: '{}'", to, message)
  }
}

fn main() {
  // Register both implementations under their own qualifier.
  let mut module = Module::new();
  module
    .single_trait::<dyn MessageSender, _>(|_| Ok(Arc::new(EmailSender)))
    .named("email");
  module
    .single_trait::<dyn MessageSender, _>(|_| Ok(Arc::new(SmsSender)))
    .named("sms");
  ContainerBuilder::new()
    .module(module)
    .start()
    .expect("global container should start");

  // Choose the implementation at the point of resolution.
  let email_notifier = resolve!(trait MessageSender, "email");
  let sms_notifier = resolve!(trait MessageSender, "sms");

  let result1 = email_notifier.send("test@example.com", "Hello from Fibre!");
  let result2 = sms_notifier.send("+123456789", "Hello from Fibre!");
  println!("{}", result1);
  println!("{}", result2);

  assert!(result1.contains("email"));
  assert!(result2.contains("SMS"));
  fibre_di::stop();
}
