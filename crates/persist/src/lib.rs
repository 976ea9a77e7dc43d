//! Entity metadata and dynamic query engine for SQL databases.
//!
//! Records are declared once with [`entity!`]; their descriptors are built
//! lazily and cached per type. Predicates are assembled with [`Cond`], rendered
//! through ``SeaQuery`` into dialect-specific SQL, and executed by a
//! caller-supplied [`Session`].
//!
//! # Quick Start
//!
//! ## Declare an Entity
//!
//! ```ignore
//! use omnia_persist::entity;
//!
//! entity! {
//!     table = "orders",
//!     declare = |d| d
//!         .primary_key("order_id")
//!         .property("order_id", |p| p.autoincrement())
//!         .property("status", |p| p.default_value("NEW")),
//!     #[derive(Debug, Clone, Default)]
//!     pub struct Order {
//!         pub order_id: i64,
//!         pub user_name: String,
//!         pub total_amount: f64,
//!         pub status: String,
//!     }
//! }
//! ```
//!
//! ## Predicates
//!
//! ```ignore
//! use omnia_persist::Cond;
//!
//! // status = ? AND (total_amount > ? OR discount IS NULL)
//! let cond = Cond::new()
//!     .eq("status", "PAID")
//!     .and()
//!     .bracket(Cond::new().gt("total_amount", 100).or().is_null("discount"));
//! ```
//!
//! ## Repository
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use omnia_persist::{Criteria, CrudRepository, Database, DataSource, Fields, Page, Sqlite, SqliteSession};
//!
//! let session = SqliteSession::open_in_memory()?;
//! let database = Database::default()
//!     .with_source(DataSource::new("default", Arc::new(session), Arc::new(Sqlite)));
//! let orders = CrudRepository::<Order>::new(Arc::new(database));
//!
//! let payload = serde_json::json!({"userName": "bob"});
//! let created = orders.create(None, &payload, &Fields::new(), None)?;
//! let paid = orders.find_all(None, Criteria::new().cond(cond).page(Page::new(1)))?;
//! ```
//!
//! ## Differential Updates
//!
//! ```ignore
//! let order = executor.find_by_key::<Order, _>(&7_i64, &Fields::new(), true, None)?;
//! let mut state = StateWrapper::bind(order.unwrap_or_default(), false)?;
//! state.record_mut().status = "SHIPPED".to_string();
//! // UPDATE orders SET status = ? WHERE order_id = ?
//! state.update(&executor, &Fields::new(), None)?;
//! ```

mod cache;
mod clause;
mod cond;
mod convert;
mod delete;
mod descriptor;
mod dialect;
mod entity;
mod error;
mod executor;
mod fields;
mod func;
mod insert;
mod join;
mod naming;
mod outcome;
mod page;
mod params;
mod query;
mod repository;
mod select;
mod session;
mod sharding;
mod sqlite;
mod state;
mod types;
mod update;

pub use cache::{describe, registered};
pub use clause::{GroupBy, OrderBy, Where};
pub use cond::{Cond, Fragment, Opt, placeholder_count};
pub use convert::{FetchValue, StorageType, convert, data_type_to_json, json_to_data_type, to_text};
pub use delete::DeleteBuilder;
pub use descriptor::{
    Declaration, EntityDescriptor, IndexDescriptor, PropertyDecl, PropertyDescriptor,
};
pub use dialect::{Dialect, MySql, Postgres, Sqlite};
pub use entity::{Column, Entity, EntityValues, FieldSpec, Payload};
pub use error::{Error, Result};
pub use executor::Executor;
pub use fields::Fields;
pub use func::Func;
pub use insert::InsertBuilder;
pub use join::{Join, JoinKind};
pub use naming::{to_property_name, to_storage_name};
pub use outcome::{ErrorCode, Outcome};
pub use page::{DEFAULT_PAGE_SIZE, Page, ResultSet};
pub use params::Params;
pub use query::{Query, number_placeholders};
pub use repository::{Criteria, CrudRepository, Hooks, NoHooks, Saved};
pub use sea_query::Order;
pub use select::SelectBuilder;
pub use session::{DataSource, Database, DatabaseOptions, Inserted, Session};
pub use sharding::{ModuloSharding, ShardContext, ShardingRule, SuffixSharding};
pub use sqlite::{SqliteOptions, SqliteSession};
pub use state::{StateWrapper, UpdateOutcome};
pub use types::{DataType, Field, Row};
pub use update::UpdateBuilder;

// Re-exports for ``entity`` macro use only. This is needed to avoid leaking ``SeaQuery`` value
// types into caller code
#[doc(hidden)]
pub mod __private {
    pub use anyhow::Result;
    pub use sea_query::Value;
}
