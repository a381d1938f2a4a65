//! スナップショットの読み込みから具体化までのテスト

use std::io::Write;

use ilmono::error::{MetadataError, MonoError};
use ilmono::instantiation::InstantiationTable;
use ilmono::metadata::snapshot::{load_snapshot, parse_snapshot, LoadedSnapshot, RequestTarget};
use ilmono::metadata::{HandlerKind, Metadata, TypeFlags};
use ilmono::signature::{CorLibType, TypeSig};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

const SNAPSHOT: &str = r#"{
  "types": [
    { "namespace": "System", "name": "Exception", "corlib": true },
    { "namespace": "Demo", "name": "Calc",
      "methods": [
        { "name": "Add", "calling_convention": 32, "attributes": 6,
          "ret": { "primitive": "Int32" }, "params": [ { "primitive": "Int32" } ],
          "body": {
            "locals": [ { "primitive": "Int32" } ],
            "handlers": [
              { "kind": "catch", "try_start": 0, "try_end": 2, "handler_start": 2,
                "handler_end": 4, "catch_type": { "type": "System.Exception" } }
            ],
            "instructions": [
              { "offset": 0, "opcode": "ldarg.1" },
              { "offset": 1, "opcode": "ldc.i4", "operand": { "int": 1 } },
              { "offset": 2, "opcode": "ret" }
            ]
          } }
      ] },
    { "namespace": "Demo", "name": "Box`1", "generic_params": 1,
      "fields": [ { "name": "value", "type": { "var": { "number": 0 } } } ],
      "methods": [
        { "name": "Get", "calling_convention": 32, "attributes": 6,
          "ret": { "var": { "number": 0 } } },
        { "name": "Wrap", "calling_convention": 0, "attributes": 22, "generic_params": 1,
          "ret": { "generic_inst": { "generic_type": "Demo.Box`1", "args": [ { "mvar": 0 } ] } },
          "params": [ { "sz_array": { "mvar": 0 } } ] }
      ] }
  ],
  "instantiations": [
    { "type": "Demo.Calc", "method": "Add" },
    { "type": "Demo.Box`1", "type_args": [ { "primitive": "String" } ], "method": "Get" },
    { "type": "Demo.Box`1", "type_args": [ { "primitive": "String" } ], "field": "value" },
    { "type": "Demo.Box`1", "type_args": [ { "primitive": "Int32" } ],
      "method": "Wrap", "method_args": [ { "type": "Demo.Calc" } ] },
    { "type": "Demo.Box`1", "type_args": [ { "var": { "number": 0, "owner": "Demo.Box`1" } } ] }
  ]
}"#;

fn write_snapshot(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn resolve(loaded: &LoadedSnapshot) -> (InstantiationTable, usize) {
    let mut table = InstantiationTable::new();
    let mut skipped = 0;
    for request in &loaded.requests {
        let Some(ty) = table
            .resolve_type(&loaded.metadata, request.ty, request.type_args.clone())
            .unwrap()
        else {
            skipped += 1;
            continue;
        };
        match &request.target {
            RequestTarget::Type => {}
            RequestTarget::Method { def, args } => {
                table
                    .resolve_method(&loaded.metadata, ty, *def, args.clone())
                    .unwrap();
            }
            RequestTarget::Field { index } => {
                table.resolve_field(&loaded.metadata, ty, *index).unwrap();
            }
        }
    }
    (table, skipped)
}

#[test]
fn test_load_snapshot_from_file() {
    let file = write_snapshot(SNAPSHOT);
    let loaded = load_snapshot(file.path()).unwrap();

    assert_eq!(loaded.metadata.types().len(), 3);
    assert_eq!(loaded.requests.len(), 5);

    let calc = loaded.metadata.expect_type("Demo.Calc").unwrap();
    let add = loaded.metadata.method_def(loaded.metadata.find_method(calc, "Add").unwrap());
    let body = add.body.as_ref().unwrap();
    assert_eq!(body.locals, vec![TypeSig::corlib(CorLibType::Int32)]);
    assert_eq!(body.instructions.len(), 3);
    assert_eq!(body.handlers[0].kind, HandlerKind::Catch);
    let exception = loaded.metadata.expect_type("System.Exception").unwrap();
    assert_eq!(
        body.handlers[0].catch_type,
        Some(loaded.metadata.type_def(exception).sig())
    );
}

#[test]
fn test_snapshot_requests_produce_keys() {
    let file = write_snapshot(SNAPSHOT);
    let loaded = load_snapshot(file.path()).unwrap();

    let (table, skipped) = resolve(&loaded);

    assert_eq!(skipped, 1);
    let types: Vec<String> = table
        .types()
        .map(|(_, inst)| inst.name_key().unwrap().to_string())
        .collect();
    assert_eq!(
        types,
        vec!["Demo.Calc", "Demo.Box`1<String>", "Demo.Box`1<Int32>"]
    );

    let methods: Vec<String> = table
        .methods()
        .map(|(_, inst)| inst.concretized_key().unwrap())
        .collect();
    assert_eq!(
        methods,
        vec![
            "Add|Int32(Int32)|20|6",
            "Get|String()|20|6",
            "Wrap|Demo.Box`1<Demo.Calc><Demo.Calc>(Demo.Calc[])|10|16",
        ]
    );

    let fields: Vec<&str> = table.fields().map(|(_, inst)| inst.name_key()).collect();
    assert_eq!(fields, vec!["value|String"]);
}

#[test]
fn test_unknown_type_is_reported() {
    let err = parse_snapshot(r#"{ "instantiations": [ { "type": "Demo.Missing" } ] }"#)
        .unwrap()
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        MonoError::Metadata(MetadataError::UnknownType {
            name: "Demo.Missing".to_string()
        })
    );
}

#[test]
fn test_unknown_method_is_reported() {
    let err = parse_snapshot(
        r#"{
            "types": [ { "namespace": "Demo", "name": "Calc" } ],
            "instantiations": [ { "type": "Demo.Calc", "method": "Sub" } ]
        }"#,
    )
    .unwrap()
    .build()
    .unwrap_err();

    assert!(matches!(
        err,
        MonoError::Metadata(MetadataError::UnknownMethod { .. })
    ));
}

#[test]
fn test_type_var_needs_an_owner_outside_types() {
    let err = parse_snapshot(
        r#"{
            "types": [ { "namespace": "Demo", "name": "Box`1", "generic_params": 1 } ],
            "instantiations": [ { "type": "Demo.Box`1", "type_args": [ { "var": { "number": 0 } } ] } ]
        }"#,
    )
    .unwrap()
    .build()
    .unwrap_err();

    assert_eq!(
        err,
        MonoError::Metadata(MetadataError::TypeVarWithoutOwner { number: 0 })
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_snapshot(&dir.path().join("missing.json")).unwrap_err();

    assert!(matches!(err, MonoError::Io(_)));
}

#[test]
fn test_duplicate_type_is_rejected() {
    let err = parse_snapshot(
        r#"{
            "types": [
                { "namespace": "Demo", "name": "Calc" },
                { "namespace": "Demo", "name": "Calc", "generic_params": 1 }
            ]
        }"#,
    )
    .unwrap()
    .build()
    .unwrap_err();

    assert_eq!(
        err,
        MonoError::Metadata(MetadataError::DuplicateType {
            name: "Demo.Calc".to_string()
        })
    );
}

#[test]
fn test_add_type_keeps_the_first_definition() {
    let mut metadata = Metadata::new();
    let first = metadata.add_type("Demo", "Calc", 0, TypeFlags::default()).unwrap();

    let err = metadata
        .add_type("Demo", "Calc", 2, TypeFlags::default())
        .unwrap_err();

    assert!(matches!(
        err,
        MonoError::Metadata(MetadataError::DuplicateType { .. })
    ));
    assert_eq!(metadata.types().len(), 1);
    assert_eq!(metadata.expect_type("Demo.Calc").unwrap(), first);
    assert_eq!(metadata.type_def(first).gen_param_count, 0);
}
