use log::*;

use std::thread;
use futures::executor;

use crossbeam_channel::{
  unbounded, Sender, Receiver,
};

use actix_cors::Cors;
use actix_rt::System;
use actix_web::{get, web, middleware, HttpResponse, App, HttpServer};
use actix_web::dev::ServerHandle;

use crate::{
  error::*,
  app::*,
  db::DbService,
  services::config_services,
};

use super::seed;

/// Lifecycle events sent from server threads to the main thread.
enum ServerEvent {
  Started(String, ServerHandle),
  Stopped(String),
  Shutdown,
}

#[derive(Clone)]
struct ServerEvents {
  tx: Sender<ServerEvent>,
}

impl ServerEvents {
  fn send(&self, ev: ServerEvent) {
    if self.tx.send(ev).is_err() {
      error!("Main thread is gone, server event dropped.");
    }
  }

  fn started(&self, name: &str, handle: ServerHandle) {
    self.send(ServerEvent::Started(name.to_string(), handle));
  }

  fn stopped(&self, name: &str) {
    debug!("Server({}) stopped, let main thread know.", name);
    self.send(ServerEvent::Stopped(name.to_string()));
  }

  fn shutdown(&self) {
    info!("Signal main thread to shutdown.");
    self.send(ServerEvent::Shutdown);
  }
}

#[get("/stop")]
async fn stop_server(events: web::Data<ServerEvents>) -> HttpResponse {
  info!("Got shutdown request.");
  events.shutdown();

  HttpResponse::Ok().body("Shutting down.")
}

fn stop_handle(name: &str, handle: ServerHandle) {
  debug!("Stop server: {}", name);
  executor::block_on(handle.stop(true));
}

/// Block until all `running` servers have stopped. A shutdown request stops
/// every started server, and any that start afterwards.
fn wait_servers(rx: &Receiver<ServerEvent>, mut running: usize) {
  let mut handles: Vec<(String, ServerHandle)> = Vec::new();
  let mut stopping = false;
  while running > 0 {
    match rx.recv() {
      Err(err) => {
        error!("Main thread waiter received error: {:?}", err);
        return;
      },
      Ok(ServerEvent::Started(name, handle)) => {
        if stopping {
          stop_handle(&name, handle);
        } else {
          handles.push((name, handle));
        }
      },
      Ok(ServerEvent::Stopped(name)) => {
        running -= 1;
        handles.retain(|(n, _)| *n != name);
        debug!("Server({}) stopped.  Remaining {}", name, running);
      },
      Ok(ServerEvent::Shutdown) => {
        info!("Got shutdown signal.  Stop servers.");
        stopping = true;
        for (name, handle) in handles.drain(..) {
          stop_handle(&name, handle);
        }
      },
    }
  }
  info!("Stopped all servers.");
}

pub fn execute(config: AppConfig) -> Result<()> {
  if config.get_bool("db.auto_migrate")?.unwrap_or(false) {
    seed::execute(config.clone())?;
  }

  let servers = config.get_str_list("servers")?
    .ok_or_else(|| Error::BadRequest("missing list of servers".to_string()))?;

  let (tx, rx) = unbounded();
  let events = ServerEvents { tx };
  for server in servers.iter() {
    let cfg = config.clone();
    let name = server.clone();
    let events = events.clone();
    debug!("Spawn server: {}", name);
    thread::spawn(move || {
      if let Err(err) = run_server(&cfg, &name, &events) {
        error!("Error from server({}): {:?}", name, err);
      }
      events.stopped(&name);
    });
  }

  wait_servers(&rx, servers.len());

  info!("main thread: stopped.");
  Ok(())
}

async fn test_db(url: String) -> Result<()> {
  let db = DbService::new(&url)?;
  db.prepare().await
}

fn build_cors(origins: &[String]) -> Cors {
  let mut cors = Cors::default()
    .allow_any_method()
    .allow_any_header()
    .max_age(3600);
  for origin in origins.iter() {
    cors = if origin == "*" {
      cors.allow_any_origin()
    } else {
      cors.allowed_origin(origin)
    };
  }
  cors
}

fn run_server(config: &AppConfig, prefix: &str, events: &ServerEvents) -> Result<()> {
  let sys = System::new();

  let debug = config.get_bool("debug")?.unwrap_or(false);
  debug!("Debug = {:?}", debug);

  if debug {
    // Test db prepared statements.
    let db_url = config.require_str("db.url")?;
    sys.block_on(test_db(db_url))?;
  }

  // configure services
  info!("Serve.Services: configure services. prefix={}", prefix);
  let services = config_services(config, prefix)?;
  let cors_origins = config.get_str_list(&format!("{}.cors_origins", prefix))?
    .unwrap_or_default();

  // Check if stopper is enabled for this server
  let stopper = if config.get_bool(&format!("{}.stopper", prefix))?.unwrap_or_default() {
    Some(events.clone())
  } else {
    None
  };

  // Start http server
  let mut server = HttpServer::new(move || {
    // base64 images make for large bodies.
    let json = web::JsonConfig::default().limit(16 * 1024 * 1024);

    let mut app = App::new()
      .app_data(json)
      .wrap(middleware::Logger::default())
      .wrap(middleware::Compress::default())
      .wrap(build_cors(&cors_origins))
      .configure(|web| services.web_config(web));

    if let Some(ref stopper) = stopper {
      // Server stopper
      app = app.app_data(web::Data::new(stopper.clone()))
        .service(stop_server);
    }

    app
  });

  // workers
  if let Some(workers) = config.get_int(&format!("{}.workers", prefix))? {
    info!("Workers: {}", workers);
    let workers: usize = workers.try_into()
      .map_err(|_| Error::BadRequest(format!("{}.workers must be > 0", prefix)))?;
    server = server.workers(workers);
  }

  // listen backlog
  if let Some(backlog) = config.get_int(&format!("{}.backlog", prefix))? {
    info!("Listen backlog: {}", backlog);
    server = server.backlog(backlog as u32);
  }

  // setup binds.
  let listen = config.require_str(&format!("{}.listen", prefix))?;
  info!("{} services listening on: {}", prefix, listen);
  server = server.bind(listen)?;

  // start server
  sys.block_on(async move {
    let server = server.run();
    events.started(prefix, server.handle());
    server.await
  })?;
  Ok(())
}
