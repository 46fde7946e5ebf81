use fibre_di::{Container, Module, Qualifier, Scope};
use std::sync::Arc;

struct Database {
  url: String,
}

// One per HTTP request.
struct Request;

struct RequestContext {
  db: Arc<Database>,
  user: Arc<String>,
}

fn main() {
  let mut module = Module::new();
  module.single(|_| {
    Ok(Database {
      url: "postgres://localhost/app".to_string(),
    })
  });
  module.scope(Qualifier::of::<Request>(), |set| {
    set
      .scoped(|ctx| {
        Ok(RequestContext {
          db: ctx.get()?,
          user: ctx.param()?,
        })
      })
      .on_release(|ctx| println!("Releasing the context of {}", ctx.user));
  });

  let container = Container::new();
  container.load_modules(&[module]).expect("modules should load");

  for user in ["alice", "bob"] {
    let scope = container
      .create_scope(format!("request-{}", user), Qualifier::of::<Request>())
      .expect("scope should be created");
    scope.register_callback(|scope: &Scope| println!("Closing {}", scope));

    let ctx = scope
      .get_with::<RequestContext>(fibre_di::parameters![user.to_string()])
      .expect("request context should resolve");
    println!("{} talks to {}", ctx.user, ctx.db.url);

    // The same scope hands out the same context.
    assert!(Arc::ptr_eq(&ctx, &scope.get::<RequestContext>().unwrap()));
    scope.close();
  }

  container.close();
}
