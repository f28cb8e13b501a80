use log::*;

use std::rc::Rc;
use std::cell::RefCell;
use std::time::Duration;

use tokio::time::sleep;

use tokio_postgres::{
  connect, Client, Statement, Row, NoTls,
  error::SqlState,
  types::ToSql,
};

use crate::error::*;

use super::{
  AuthorService,
  ArticleService,
  OfferingService,
  CatalogService,
  NewsletterService,
  ContactService,
  AdService,
};

const MAX_RETRIES: u32 = 10;

pub type RefClient = Rc<(u64, Client)>;

/// Client connected state
#[derive(Clone)]
pub enum ClientState {
  Disconnected(u64),
  Connecting(u64),
  Connected(RefClient),
}

/// A postgres client shared by every table service of one worker.
/// Each reconnect bumps the version so prepared statements know to re-prepare.
#[derive(Clone)]
pub struct SharedClient {
  state: Rc<RefCell<ClientState>>,
}

impl SharedClient {
  pub fn new(url: &str) -> Self {
    let shared_cl = Self {
      state: Rc::new(RefCell::new(ClientState::Disconnected(0))),
    };
    let task_cl = shared_cl.clone();
    let url = url.to_string();
    actix_rt::spawn(async move {
      task_cl.run_client(url).await;
      debug!("client background task stopped.");
    });
    shared_cl
  }

  async fn run_client(&self, url: String) {
    let mut version = 0;
    loop {
      version += 1;
      debug!("client task: Connecting: ver={}", version);
      self.set_state(ClientState::Connecting(version));
      let (cl, conn) = loop {
        match connect(&url, NoTls).await {
          Ok(pair) => break pair,
          Err(e) => {
            warn!("client task: ver={}: connect error: {}", version, e);
            sleep(Duration::from_millis(500)).await;
          },
        }
      };
      debug!("client task: ver={}: Connecting -> Connected", version);
      self.set_state(ClientState::Connected(Rc::new((version, cl))));

      // Drive the connection until it drops.
      match conn.await {
        Err(e) => {
          warn!("tokio-postgres connection error: {}", e);
        },
        Ok(()) => {
          debug!("tokio-postgres connection closed.");
          self.set_state(ClientState::Disconnected(version));
          return;
        },
      }
      self.set_state(ClientState::Disconnected(version));
      sleep(Duration::from_millis(500)).await;
    }
  }

  pub async fn get_client(&self) -> Result<RefClient> {
    let mut retries = 0u32;
    loop {
      match self.get_state() {
        ClientState::Connected(cl) => return Ok(cl),
        ClientState::Connecting(version) | ClientState::Disconnected(version) => {
          debug!("get_client: ver={}: waiting for connection", version);
          sleep(Duration::from_millis(100)).await;
        },
      }
      retries += 1;
      if retries >= MAX_RETRIES {
        return Err(Error::DisconnectedError("Failed to connect to database".to_string()));
      }
    }
  }

  /// Run a multi-statement script (schema setup, seeding).
  pub async fn batch_execute(&self, sql: &str) -> Result<()> {
    let cl = self.get_client().await?;
    cl.1.batch_execute(sql).await?;
    Ok(())
  }

  /// Check client version.
  pub fn check_version(&self, version: u64) -> bool {
    match *self.state.borrow() {
      ClientState::Connected(ref cl) => cl.0 == version,
      _ => false,
    }
  }

  fn get_state(&self) -> ClientState {
    self.state.borrow().clone()
  }

  fn set_state(&self, state: ClientState) {
    self.state.replace(state);
  }
}

#[derive(Clone)]
pub struct ClientStatement {
  cl: RefClient,
  statement: Statement,
}

/// Prepare statement state
#[derive(Clone)]
enum StatementState {
  Unprepared,
  Prepared(Rc<ClientStatement>),
}

/// A prepared statement that re-prepares itself after the shared client reconnects.
#[derive(Clone)]
pub struct VersionedStatement {
  shared_cl: SharedClient,
  state: Rc<RefCell<StatementState>>,
  query: String,
}

/// Map server-side errors we want callers to react to.
fn map_db_error(err: tokio_postgres::Error, query: &str) -> Error {
  if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
    let detail = err.as_db_error()
      .and_then(|db| db.constraint().map(|c| c.to_string()))
      .unwrap_or_else(|| "unique constraint".to_string());
    debug!("Unique violation on {}, query=[[{}]]", detail, query);
    return Error::Conflict(detail);
  }
  error!("Postgres DB error: {:?}, query=[[{}]]", err, query);
  err.into()
}

macro_rules! impl_client_method {
  ($method:ident, $res_ty:ty) => {
    pub async fn $method(&self, params: &[&(dyn ToSql + Sync)]) -> Result<$res_ty> {
      let mut retries = 0;
      loop {
        let cl_statement = self.get_statement().await?;
        match cl_statement.cl.1.$method(&cl_statement.statement, params).await {
          Ok(res) => return Ok(res),
          Err(err) if err.is_closed() => {
            retries += 1;
            if retries >= MAX_RETRIES {
              return Err(Error::DisconnectedError(
                "Failed to connect to database".to_string()));
            }
            info!("DB connection closed, retry query.");
            self.state.replace(StatementState::Unprepared);
            sleep(Duration::from_millis(100)).await;
          },
          Err(err) => return Err(map_db_error(err, &self.query)),
        }
      }
    }
  };
}

impl VersionedStatement {
  pub fn new(shared_cl: SharedClient, query: &str) -> Result<Self> {
    Ok(Self {
      shared_cl,
      state: Rc::new(RefCell::new(StatementState::Unprepared)),
      query: query.to_string(),
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.get_statement().await?;
    Ok(())
  }

  async fn get_statement(&self) -> Result<Rc<ClientStatement>> {
    let mut retries = 0u32;
    loop {
      let state = self.state.borrow().clone();
      if let StatementState::Prepared(cl_statement) = state {
        if self.shared_cl.check_version(cl_statement.cl.0) {
          return Ok(cl_statement);
        }
        debug!("get_statement: ver={}: stale, re-prepare", cl_statement.cl.0);
      }

      let cl = self.shared_cl.get_client().await?;
      match cl.1.prepare(&self.query).await {
        Ok(statement) => {
          let cl_statement = Rc::new(ClientStatement { cl, statement });
          self.state.replace(StatementState::Prepared(cl_statement.clone()));
          return Ok(cl_statement);
        },
        Err(err) if err.is_closed() => {
          self.state.replace(StatementState::Unprepared);
          sleep(Duration::from_millis(100)).await;
        },
        Err(err) => {
          error!("Postgres error: {}, query=[[{}]]", err, self.query);
          return Err(err.into());
        },
      }

      retries += 1;
      if retries >= MAX_RETRIES {
        return Err(Error::DisconnectedError("Failed to connect to database".to_string()));
      }
    }
  }

  impl_client_method!(query, Vec<Row>);
  impl_client_method!(query_one, Row);
  impl_client_method!(query_opt, Option<Row>);
  impl_client_method!(execute, u64);
}

/// Per-worker bundle of table services.
#[derive(Clone)]
pub struct DbService {
  pub shared_cl: SharedClient,
  pub author: AuthorService,
  pub article: ArticleService,
  pub offering: OfferingService,
  pub catalog: CatalogService,
  pub newsletter: NewsletterService,
  pub contact: ContactService,
  pub ad: AdService,
}

impl DbService {
  pub fn new(db_url: &str) -> Result<DbService> {
    let shared_cl = SharedClient::new(db_url);

    Ok(DbService {
      author: AuthorService::new(shared_cl.clone())?,
      article: ArticleService::new(shared_cl.clone())?,
      offering: OfferingService::new(shared_cl.clone())?,
      catalog: CatalogService::new(shared_cl.clone())?,
      newsletter: NewsletterService::new(shared_cl.clone())?,
      contact: ContactService::new(shared_cl.clone())?,
      ad: AdService::new(shared_cl.clone())?,
      shared_cl,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    info!("DBService: Prepare AuthorService.");
    self.author.prepare().await?;
    info!("DBService: Prepare ArticleService.");
    self.article.prepare().await?;
    info!("DBService: Prepare OfferingService.");
    self.offering.prepare().await?;
    info!("DBService: Prepare CatalogService.");
    self.catalog.prepare().await?;
    info!("DBService: Prepare NewsletterService.");
    self.newsletter.prepare().await?;
    info!("DBService: Prepare ContactService.");
    self.contact.prepare().await?;
    info!("DBService: Prepare AdService.");
    self.ad.prepare().await?;

    info!("DBService: finished.");
    Ok(())
  }
}
