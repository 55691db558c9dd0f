//! Core test fixtures for the end-to-end procedure suite.
//!
//! A [`TestDb`] bundles a scripted [`MemoryConnection`], the [`Database`]
//! facade wrapping it and a [`ProcedureRegistry`] with every command type of
//! the suite already built. The scripted procedures behave like the stored
//! procedures of a small user database:
//!
//! | Procedure           | Behavior                                               |
//! |---------------------|--------------------------------------------------------|
//! | `dbo.GetUser`       | One `(id, name)` row when `@UserId` is 42, else none   |
//! | `dbo.GetUserStatus` | Scalar `0`, read through a `ReturnValue` parameter     |
//! | `dbo.fnAdd`         | Function returning `@A + @B`                           |
//! | `dbo.Transfer`      | Writes `@Balance` and increments `@Counter`            |
//! | `dbo.ListContacts`  | Three contacts, one with a NULL nickname               |
//! | `dbo.ReadBlob`      | Writes `@Blob` and attaches a native buffer            |
//! | `dbo.RejectOrder`   | Fails with a constraint violation                      |
//!
//! # Usage
//!
//! ```rust,ignore
//! use procmap::ResultProcedure;
//! use procmap_driver_tests::fixtures::{GetUser, UserIo, test_db};
//!
//! #[tokio::test]
//! async fn test_get_user() -> anyhow::Result<()> {
//!     let db = test_db()?;
//!     let mut get_user = db.procedure::<GetUser>()?;
//!     let user = get_user.query_async(&mut UserIo::with_id(42)).await?.into_single();
//!     assert_eq!(user.map(|u| u.id), Some(42));
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use procmap::procmap_core::{DbCommand, DriverError, DriverResult};
use procmap::{
    Constructor, Database, Json, MappingOptions, ParameterDirection, ParameterSpec,
    ProcedureRegistry, ProcedureSpec, ResultColumnSpec, ResultEntity, ResultSpec,
    StoredProcedure, Value, ValueKind, constructor, converters::json_text, property,
    stored_procedure,
};
use procmap_driver_memory::{MemoryConnection, MemoryResponse, NativeTracker};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ---- I/O containers and result types ----

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserIo {
    pub user_id: i32,
    pub status: i32,
}

impl UserIo {
    pub fn with_id(user_id: i32) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub name: String,
}

impl User {
    pub fn new(id: i32, name: String) -> Self {
        Self { id, name }
    }
}

impl ResultEntity for User {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![constructor!(User::new(id: i32, name: String))]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddIo {
    pub a: i32,
    pub b: i32,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferIo {
    pub from_account: i32,
    pub amount: f64,
    pub balance: Option<f64>,
    pub counter: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactIo {
    pub owner: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub newsletter: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub nickname: Option<String>,
    pub preferences: Json<Preferences>,
}

impl ResultEntity for Contact {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![constructor!(Contact {
            id: i64,
            nickname: Option<String>,
            preferences: Json<Preferences>,
        })]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobIo {
    pub id: i32,
    pub blob: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderIo {
    pub order_id: i32,
    pub accepted: Option<bool>,
}

// ---- Command types ----

stored_procedure! {
    /// Looks up one user by id
    pub struct GetUser: UserIo => User;
}

stored_procedure! {
    /// Reports a user's status through the procedure return value
    pub struct GetUserStatus: UserIo;
}

stored_procedure! {
    /// Scalar function adding two numbers
    pub struct AddNumbers: AddIo;
}

stored_procedure! {
    pub struct Transfer: TransferIo;
}

stored_procedure! {
    pub struct ListContacts: ContactIo => Contact;
}

stored_procedure! {
    pub struct ReadBlob: BlobIo;
}

stored_procedure! {
    pub struct RejectOrder: OrderIo;
}

// ---- Mappings ----

pub fn get_user_spec() -> ProcedureSpec<GetUser> {
    ProcedureSpec::new("dbo.GetUser")
        .parameter(ParameterSpec::input("UserId", property!(UserIo, user_id: i32)))
        .result(
            ResultSpec::single::<User>()
                .column(ResultColumnSpec::new::<i32>("id"))
                .column(ResultColumnSpec::new::<String>("name").column("user_name")),
        )
}

pub fn get_user_status_spec() -> ProcedureSpec<GetUserStatus> {
    ProcedureSpec::new("dbo.GetUserStatus")
        .parameter(ParameterSpec::input("UserId", property!(UserIo, user_id: i32)))
        .parameter(ParameterSpec::return_value(property!(UserIo, status: i32)))
}

pub fn add_numbers_spec() -> ProcedureSpec<AddNumbers> {
    ProcedureSpec::function("dbo.fnAdd")
        .parameter(ParameterSpec::input("A", property!(AddIo, a: i32)))
        .parameter(ParameterSpec::input("B", property!(AddIo, b: i32)))
        .parameter(ParameterSpec::return_value(property!(AddIo, total: i64)))
}

pub fn transfer_spec() -> ProcedureSpec<Transfer> {
    ProcedureSpec::new("dbo.Transfer")
        .parameter(ParameterSpec::input(
            "FromAccount",
            property!(TransferIo, from_account: i32),
        ))
        .parameter(ParameterSpec::input("Amount", property!(TransferIo, amount: f64)))
        .parameter(ParameterSpec::output("Balance", property!(TransferIo, balance: Option<f64>)))
        .parameter(ParameterSpec::input_output(
            "Counter",
            property!(TransferIo, counter: i64),
        ))
}

pub fn list_contacts_spec() -> ProcedureSpec<ListContacts> {
    ProcedureSpec::new("dbo.ListContacts")
        .parameter(ParameterSpec::input("Owner", property!(ContactIo, owner: i32)))
        .result(
            ResultSpec::collection::<Contact>()
                .column(ResultColumnSpec::new::<i64>("id").raw_kind(ValueKind::Int32))
                .column(ResultColumnSpec::new::<Option<String>>("nickname").nullable())
                .column(
                    ResultColumnSpec::new::<Json<Preferences>>("preferences")
                        .raw_kind(ValueKind::String)
                        .with_converter(json_text::<Preferences>()),
                ),
        )
}

pub fn read_blob_spec() -> ProcedureSpec<ReadBlob> {
    ProcedureSpec::new("dbo.ReadBlob")
        .parameter(ParameterSpec::input("Id", property!(BlobIo, id: i32)))
        .parameter(
            ParameterSpec::output("Blob", property!(BlobIo, blob: Option<Vec<u8>>)).with_size(1024),
        )
}

pub fn reject_order_spec() -> ProcedureSpec<RejectOrder> {
    ProcedureSpec::new("dbo.RejectOrder")
        .parameter(ParameterSpec::input("OrderId", property!(OrderIo, order_id: i32)))
        .parameter(ParameterSpec::output("Accepted", property!(OrderIo, accepted: Option<bool>)))
}

/// Build every mapping of the suite into `registry`
pub fn register_all(registry: &ProcedureRegistry) -> procmap::Result<()> {
    registry.build(get_user_spec())?;
    registry.build(get_user_status_spec())?;
    registry.build(add_numbers_spec())?;
    registry.build(transfer_spec())?;
    registry.build(list_contacts_spec())?;
    registry.build(read_blob_spec())?;
    registry.build(reject_order_spec())?;
    Ok(())
}

// ---- Scripted procedures ----

fn int_parameter(command: &DbCommand, name: &str) -> i64 {
    command
        .parameter(name)
        .and_then(|p| p.value.as_i64())
        .unwrap_or_default()
}

fn get_user(command: &mut DbCommand) -> DriverResult<MemoryResponse> {
    let rows = if int_parameter(command, "UserId") == 42 {
        vec![vec![Value::Int32(42), Value::String("Ada".into())]]
    } else {
        Vec::new()
    };
    Ok(MemoryResponse::rows(&["id", "user_name"], rows))
}

fn add(command: &mut DbCommand) -> DriverResult<MemoryResponse> {
    let total = int_parameter(command, "A") + int_parameter(command, "B");
    if let Some(ret) = command
        .parameters
        .iter_mut()
        .find(|p| p.direction == ParameterDirection::ReturnValue)
    {
        ret.value = Value::Int64(total);
    }
    Ok(MemoryResponse::scalar(Value::Null))
}

fn transfer(command: &mut DbCommand) -> DriverResult<MemoryResponse> {
    let amount = command
        .parameter("Amount")
        .and_then(|p| p.value.as_f64())
        .unwrap_or_default();
    let counter = int_parameter(command, "Counter");
    if let Some(balance) = command.parameter_mut("Balance") {
        balance.value = Value::Float64(100.0 - amount);
    }
    if let Some(counter_param) = command.parameter_mut("Counter") {
        counter_param.value = Value::Int64(counter + 1);
    }
    Ok(MemoryResponse::scalar(Value::Int32(0)))
}

fn list_contacts(_command: &mut DbCommand) -> DriverResult<MemoryResponse> {
    Ok(MemoryResponse::rows(
        &["id", "nickname", "preferences"],
        vec![
            vec![
                Value::Int32(1),
                Value::String("ada".into()),
                Value::String(r#"{"newsletter":true}"#.into()),
            ],
            vec![
                Value::Int32(2),
                Value::Null,
                Value::String(r#"{"newsletter":false}"#.into()),
            ],
            vec![
                Value::Int32(3),
                Value::String("bob".into()),
                Value::String(r#"{"newsletter":false}"#.into()),
            ],
        ],
    ))
}

fn reject_order(_command: &mut DbCommand) -> DriverResult<MemoryResponse> {
    Err(DriverError::Constraint(
        "The INSERT statement conflicted with the FOREIGN KEY constraint \"FK_Order_Customer\""
            .into(),
    ))
}

/// A memory connection with every procedure of the suite scripted
pub fn scripted_connection(tracker: &NativeTracker) -> MemoryConnection {
    let handles = tracker.clone();
    MemoryConnection::new()
        .with_procedure("dbo.GetUser", get_user)
        .with_procedure("dbo.GetUserStatus", |_| {
            Ok(MemoryResponse::scalar(Value::Int32(0)))
        })
        .with_procedure("dbo.fnAdd", add)
        .with_procedure("dbo.Transfer", transfer)
        .with_procedure("dbo.ListContacts", list_contacts)
        .with_procedure("dbo.ReadBlob", move |command| {
            if let Some(blob) = command.parameter_mut("Blob") {
                blob.value = Value::Bytes(b"procmap".to_vec());
                blob.attach_native(Box::new(handles.handle()));
            }
            Ok(MemoryResponse::scalar(Value::Int32(0)))
        })
        .with_procedure("dbo.RejectOrder", reject_order)
}

/// A scripted database with every mapping of the suite registered
pub struct TestDb {
    pub connection: Arc<MemoryConnection>,
    pub database: Arc<Database>,
    pub registry: ProcedureRegistry,
    pub tracker: NativeTracker,
}

impl TestDb {
    /// A fresh command instance wired to this database
    pub fn procedure<P: StoredProcedure>(&self) -> procmap::Result<P> {
        self.registry.procedure::<P>(self.database.clone())
    }
}

/// A test database with default mapping options
pub fn test_db() -> Result<TestDb> {
    test_db_with(MappingOptions::default(), None)
}

/// A test database whose connection delays every command by `latency`
pub fn slow_test_db(latency: Duration) -> Result<TestDb> {
    test_db_with(MappingOptions::default(), Some(latency))
}

pub fn test_db_with(options: MappingOptions, latency: Option<Duration>) -> Result<TestDb> {
    init_tracing();

    let tracker = NativeTracker::new();
    let mut connection = scripted_connection(&tracker);
    if let Some(latency) = latency {
        connection = connection.with_latency(latency);
    }
    let connection = Arc::new(connection);
    let database = Arc::new(Database::new(connection.clone()));

    let registry = ProcedureRegistry::with_options(options);
    register_all(&registry)?;
    tracing::debug!(procedures = registry.len(), "test database ready");

    Ok(TestDb {
        connection,
        database,
        registry,
        tracker,
    })
}
