use monkey_compiler::{compile_str, decompile};
use monkey_types::{SpecIR, StatusBucket};
use monkey_validator::{SchemaValidator, ValidatorError};
use serde_json::{json, Value};

const PEOPLE: &str = r##"
openapi: 3.0.0
paths:
  /people:
    post:
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: '#/components/schemas/Person'}
      responses:
        '201':
          description: created
          content:
            application/json:
              schema:
                type: object
                required: [id, person]
                properties:
                  id: {type: integer, minimum: 1}
                  person: {$ref: '#/components/schemas/Person'}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                nullable: true
                properties:
                  code: {type: string, enum: [bad_request, conflict]}
components:
  schemas:
    Person:
      type: object
      required: [age]
      properties:
        name: {type: string}
        age: {type: integer}
        nickname: {type: string, nullable: true, maxLength: 4}
        friends:
          type: array
          items: {$ref: '#/components/schemas/Person'}
"##;

#[test]
fn missing_required_property_is_one_issue() {
    let ir = compile_str(PEOPLE).unwrap();
    let validator = SchemaValidator::new(&ir.schemas);

    let issues = validator
        .validate_ref("#/components/schemas/Person", &json!({"name": "Roger"}))
        .unwrap();
    assert_eq!(issues.len(), 1, "{issues:?}");
    assert_eq!(issues[0].keyword, "required");
    assert!(issues[0].message.contains("age"), "{}", issues[0].message);
    assert_eq!(issues[0].path, "");
}

#[test]
fn wrong_root_type_is_a_type_issue() {
    let ir = compile_str(PEOPLE).unwrap();
    let validator = SchemaValidator::new(&ir.schemas);

    let issues = validator.validate_ref("Person", &json!(42)).unwrap();
    assert_eq!(issues.len(), 1, "{issues:?}");
    assert_eq!(issues[0].keyword, "type");
}

#[test]
fn conforming_payloads_have_no_issues() {
    let ir = compile_str(PEOPLE).unwrap();
    let validator = SchemaValidator::new(&ir.schemas);

    let person = json!({
        "name": "Roger",
        "age": 42,
        "nickname": null,
        "friends": [{"age": 7, "nickname": "Bo"}]
    });
    assert!(validator.validate_ref("Person", &person).unwrap().is_empty());
}

#[test]
fn nested_issues_point_into_the_payload() {
    let ir = compile_str(PEOPLE).unwrap();
    let validator = SchemaValidator::new(&ir.schemas);

    let person = json!({"age": 1, "friends": [{"age": "seven"}]});
    let issues = validator.validate_ref("Person", &person).unwrap();
    assert_eq!(issues.len(), 1, "{issues:?}");
    assert_eq!(issues[0].path, "/friends/0/age");
    assert_eq!(issues[0].keyword, "type");
}

#[test]
fn unknown_references_are_not_validation_failures() {
    let ir = compile_str(PEOPLE).unwrap();
    let validator = SchemaValidator::new(&ir.schemas);

    assert_eq!(
        validator.validate_ref("Animal", &json!({})),
        Err(ValidatorError::NoSuchRef("Animal".into()))
    );
    assert!(matches!(
        validator.validate_ref("999", &json!({})),
        Err(ValidatorError::NoSuchRef(_))
    ));
}

fn probes() -> Vec<Value> {
    vec![
        json!(null),
        json!(42),
        json!("Roger"),
        json!({}),
        json!({"name": "Roger"}),
        json!({"age": 3}),
        json!({"age": 3, "nickname": "toolong"}),
        json!({"age": 3, "nickname": null}),
        json!({"age": 3, "friends": [{"name": "x"}]}),
        json!({"id": 1, "person": {"age": 3}}),
        json!({"id": 0, "person": {"age": 3}}),
        json!({"id": 1}),
        json!({"code": "conflict"}),
        json!({"code": "teapot"}),
    ]
}

/// Verdict of every probe against every input and output position.
fn verdicts(ir: &SpecIR) -> Vec<(String, Vec<usize>)> {
    let validator = SchemaValidator::new(&ir.schemas);
    let mut out = Vec::new();
    for endpoint in &ir.endpoints {
        let body = endpoint.body().map(|param| param.sid);
        let outputs = endpoint
            .outputs
            .iter()
            .map(|(bucket, sid)| (bucket.to_string(), Some(*sid)));
        for (label, sid) in std::iter::once(("body".to_string(), body)).chain(outputs) {
            let Some(sid) = sid else { continue };
            let counts = probes()
                .iter()
                .map(|probe| validator.validate(sid, probe).unwrap().len())
                .collect();
            out.push((format!("{endpoint} {label}"), counts));
        }
    }
    out
}

#[test]
fn recompiled_ir_validates_identically() {
    let first = compile_str(PEOPLE).unwrap();
    let second = compile_str(PEOPLE).unwrap();
    assert_eq!(verdicts(&first), verdicts(&second));

    let rebuilt = serde_json::to_string(&decompile(&first).unwrap()).unwrap();
    let third = compile_str(&rebuilt).unwrap();
    assert_eq!(verdicts(&first), verdicts(&third));

    let expected_outputs = [StatusBucket::DEFAULT, StatusBucket::parse("201").unwrap()];
    assert_eq!(
        third.endpoints[0].outputs.keys().copied().collect::<Vec<_>>(),
        expected_outputs
    );
}
