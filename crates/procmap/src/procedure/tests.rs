//! Tests for procedure validation and compilation

use super::*;
use crate::{Constructor, ResultColumnSpec, constructor, property, stored_procedure};
use pretty_assertions::assert_eq;

#[derive(Debug, Default)]
struct UserIo {
    user_id: i32,
    status: i32,
    total: i64,
}

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: i32,
    name: String,
}

impl User {
    fn new(id: i32, name: String) -> Self {
        Self { id, name }
    }
}

impl ResultEntity for User {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![constructor!(User::new(id: i32, name: String))]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: i32,
}

impl ResultEntity for Order {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![constructor!(Order { id: i32 })]
    }
}

stored_procedure! {
    struct GetUser: UserIo => User;
}

stored_procedure! {
    struct TouchUser: UserIo;
}

fn user_result() -> ResultSpec {
    ResultSpec::single::<User>()
        .column(ResultColumnSpec::new::<i32>("id"))
        .column(ResultColumnSpec::new::<String>("name"))
}

fn compile_err<P: StoredProcedure>(spec: ProcedureSpec<P>) -> ProcedureError {
    spec.compile(&MappingOptions::default())
        .expect_err("specification must be rejected")
}

#[test]
fn test_result_procedure_compiles() {
    let compiled = ProcedureSpec::<GetUser>::new("dbo.GetUser")
        .parameter(ParameterSpec::input(
            "UserId",
            property!(UserIo, user_id: i32),
        ))
        .result(user_result())
        .compile(&MappingOptions::default())
        .expect("compiles");

    assert_eq!(compiled.procedure_name(), "dbo.GetUser");
    assert!(!compiled.is_function());
    assert!(compiled.has_result());
    assert!(!compiled.is_collection());
    assert_eq!(compiled.result_type(), Some(TypeInfo::of::<User>()));
    assert!(compiled.result::<User>().is_some());
    assert!(compiled.result::<Order>().is_none());
    assert_eq!(compiled.command_type(), TypeInfo::of::<GetUser>());
    assert_eq!(compiled.return_value_index(), None);
}

#[test]
fn test_name_is_used_verbatim() {
    let compiled = ProcedureSpec::<TouchUser>::new("[audit].[Touch User]")
        .compile(&MappingOptions::default())
        .expect("compiles");
    assert_eq!(compiled.procedure_name(), "[audit].[Touch User]");
}

#[test]
fn test_padded_name_kept_as_given() {
    let compiled = ProcedureSpec::<TouchUser>::new(" dbo.Touch ")
        .compile(&MappingOptions::default())
        .expect("compiles");
    assert_eq!(compiled.procedure_name(), " dbo.Touch ");
}

#[test]
fn test_missing_name_rejected() {
    let err = compile_err(ProcedureSpec::<TouchUser>::unnamed());
    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "'No procedure name has been provided!' (In procedure or function 'TouchUser')"
    );

    let err = compile_err(ProcedureSpec::<TouchUser>::new("   "));
    assert!(err.to_string().contains("No procedure name has been provided!"));
}

#[test]
fn test_named_fills_in_missing_name() {
    let compiled = ProcedureSpec::<TouchUser>::unnamed()
        .named("dbo.Touch")
        .compile(&MappingOptions::default())
        .expect("compiles");
    assert_eq!(compiled.procedure_name(), "dbo.Touch");
}

#[test]
fn test_function_with_result_rejected() {
    let err = compile_err(ProcedureSpec::<GetUser>::function("dbo.fnUser").result(user_result()));
    assert_eq!(
        err.to_string(),
        "'A function cannot have a result set!' (In procedure or function 'dbo.fnUser')"
    );
}

#[test]
fn test_return_value_with_result_rejected() {
    let err = compile_err(
        ProcedureSpec::<GetUser>::new("dbo.GetUser")
            .parameter(ParameterSpec::return_value(property!(UserIo, status: i32)))
            .result(user_result()),
    );
    assert!(
        err.to_string()
            .contains("Procedure cannot have both a ReturnValue parameter and a result set!")
    );
}

#[test]
fn test_two_return_values_rejected_with_names() {
    let err = compile_err(
        ProcedureSpec::<TouchUser>::new("dbo.Touch")
            .parameter(ParameterSpec::new(
                "First",
                ParameterDirection::ReturnValue,
                property!(UserIo, status: i32),
            ))
            .parameter(ParameterSpec::new(
                "Second",
                ParameterDirection::ReturnValue,
                property!(UserIo, total: i64),
            )),
    );
    assert!(err.is_configuration());
    assert!(
        err.to_string()
            .contains("Only one ReturnValue parameter is allowed; found 2: First,Second")
    );
}

#[test]
fn test_result_on_plain_procedure_rejected() {
    let err = compile_err(ProcedureSpec::<TouchUser>::new("dbo.Touch").result(user_result()));
    assert!(err.to_string().contains("must be a result procedure"));
}

#[test]
fn test_result_type_must_match_declared_row() {
    let err = compile_err(
        ProcedureSpec::<GetUser>::new("dbo.GetUser")
            .result(ResultSpec::single::<Order>().column(ResultColumnSpec::new::<i32>("id"))),
    );
    assert!(err.to_string().contains("does not match the result type"));
}

#[test]
fn test_result_procedure_without_result_rejected() {
    let err = compile_err(ProcedureSpec::<GetUser>::new("dbo.GetUser"));
    assert!(err.to_string().contains("no result set has been configured"));
}

#[test]
fn test_output_on_computed_property_rejected() {
    let err = compile_err(ProcedureSpec::<TouchUser>::new("dbo.Touch").parameter(
        ParameterSpec::output(
            "Total",
            property!(UserIo, doubled: i64 => |io| io.total * 2),
        ),
    ));
    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "'Property has no backing storage and cannot be written (property 'doubled')' \
         (Parameter 'Total' in procedure or function 'dbo.Touch')"
    );
}

#[test]
fn test_function_keeps_return_value_index() {
    let compiled = ProcedureSpec::<TouchUser>::function("dbo.fnTotal")
        .parameter(ParameterSpec::input(
            "UserId",
            property!(UserIo, user_id: i32),
        ))
        .parameter(ParameterSpec::return_value(property!(UserIo, total: i64)))
        .compile(&MappingOptions::default())
        .expect("compiles");

    assert!(compiled.is_function());
    assert_eq!(compiled.return_value_index(), Some(1));
    assert!(compiled.parameters()[1].name().starts_with("ReturnValue_"));
}

#[test]
fn test_execution_contexts_share_compiled_procedure() {
    let compiled = Arc::new(
        ProcedureSpec::<TouchUser>::new("dbo.Touch")
            .compile(&MappingOptions::default())
            .expect("compiles"),
    );
    let a = compiled.create_execution_context();
    let b = compiled.create_execution_context();

    assert!(Arc::ptr_eq(a.procedure(), b.procedure()));
    assert_eq!(Arc::strong_count(&compiled), 3);
}
