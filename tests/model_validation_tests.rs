use project_hub::models::{Membership, Role, UpdateProjectRequest, User};
use uuid::Uuid;

#[test]
fn test_role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), r#""owner""#);
    assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), r#""editor""#);
    assert_eq!(serde_json::to_string(&Role::Reader).unwrap(), r#""reader""#);

    let parsed: Role = serde_json::from_str(r#""editor""#).unwrap();
    assert_eq!(parsed, Role::Editor);
}

#[test]
fn test_membership_json_shape() {
    let membership = Membership {
        user_id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        role: Role::Reader,
    };

    let json_output = serde_json::to_string(&membership).unwrap();
    assert!(json_output.contains(r#""role":"reader""#));
}

#[test]
fn test_user_verification_code_never_serialized() {
    // The code is mailed out of band; leaking it through any API response
    // would let a caller verify an account they do not control.
    let user = User {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        is_verified: false,
        verification_code: Uuid::new_v4(),
    };

    let json_output = serde_json::to_string(&user).unwrap();
    assert!(!json_output.contains("verification_code"));
    assert!(json_output.contains(r#""email":"alice@example.com""#));
}

#[test]
fn test_update_project_request_null_equals_omitted() {
    // An explicit null and an omitted field both land as None: a description
    // can be replaced but not cleared through this payload.
    let explicit_null: UpdateProjectRequest =
        serde_json::from_str(r#"{"name":"Kept","description":null}"#).unwrap();
    assert_eq!(explicit_null.description, None);

    let omitted: UpdateProjectRequest = serde_json::from_str(r#"{"name":"Kept"}"#).unwrap();
    assert_eq!(omitted.description, None);
}

#[test]
fn test_update_project_request_optionality() {
    // Confirms the structure supports partial updates: None fields are
    // omitted from the payload entirely.
    let partial_update = UpdateProjectRequest {
        name: Some("New Name Only".to_string()),
        description: None,
    };

    let json_output = serde_json::to_string(&partial_update).unwrap();
    assert!(json_output.contains(r#""name":"New Name Only""#));
    assert!(!json_output.contains("description"));
}
