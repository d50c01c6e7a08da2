//! User directory and the create/edit form against a mock backend.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use console_client::{ClientError, ListParams};
use console_core::{BusinessUnitId, BusinessUnitOption, ClientId, UserId};

use common::*;

fn edited_user() -> serde_json::Value {
    json!({
        "_id": "u1",
        "firstName": "Grace",
        "lastName": "Hopper",
        "email": "grace@example.com",
        "mobileNumber": "5550100",
        "isdCode": "+1",
        "countryId": "us",
        "role": "r1",
        "status": {"code": "active", "label": "Active"},
        "clientId": "c1",
        "businessUnit": {"_id": "b", "name": "Beta"}
    })
}

async fn mount_reference_lists(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/location/countries/list"))
        .respond_with(ok(json!([{"_id": "us", "name": "United States", "isdCode": "+1"}])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/client/getActive"))
        .respond_with(ok(json!([{"_id": "c1", "companyName": "Acme"}, {"_id": "c2", "companyName": "Globex"}])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/role/list"))
        .respond_with(ok(json!([{"_id": "r1", "name": "Admin"}])))
        .mount(server)
        .await;
}

async fn mount_edited_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/admin/u1"))
        .respond_with(ok(edited_user()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn edit_form_injects_the_users_unit_missing_from_the_list() {
    let server = MockServer::start().await;
    let ctx = signed_in_context(&server).await;
    mount_reference_lists(&server).await;
    mount_edited_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/business/getByClientForDropdown/c1"))
        .respond_with(ok(json!([{"_id": "a", "name": "Alpha"}])))
        .expect(1)
        .mount(&server)
        .await;

    let form = ctx.edit_user_form(UserId::new("u1")).await.unwrap();

    assert_eq!(form.form().business_unit_id, Some(BusinessUnitId::new("b")));
    assert_eq!(
        form.business_unit_options(),
        vec![BusinessUnitOption::new("b", "Beta"), BusinessUnitOption::new("a", "Alpha")]
    );
    // The cache holds what the backend returned.
    assert_eq!(ctx.reference().business_units(&ClientId::new("c1")).len(), 1);
    assert_eq!(form.selected_country().unwrap().name, "United States");
}

#[tokio::test]
async fn late_units_for_a_deselected_client_leave_the_form_alone() {
    let server = MockServer::start().await;
    let ctx = signed_in_context(&server).await;
    mount_reference_lists(&server).await;
    Mock::given(method("GET"))
        .and(path("/business/getByClientForDropdown/c1"))
        .respond_with(ok(json!([{"_id": "x", "name": "Slow"}])).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/business/getByClientForDropdown/c2"))
        .respond_with(ok(json!([{"_id": "y", "name": "Fast"}])))
        .mount(&server)
        .await;

    let form = ctx.new_user_form().await.unwrap();
    let (first, second) = tokio::join!(form.select_client(Some(ClientId::new("c1"))), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        form.select_business_unit(Some(BusinessUnitId::new("y")));
        form.select_client(Some(ClientId::new("c2"))).await
    });
    first.unwrap();
    second.unwrap();

    let state = form.form();
    assert_eq!(state.client_id, Some(ClientId::new("c2")));
    assert_eq!(state.business_unit_id, None);
    assert_eq!(form.business_unit_options(), vec![BusinessUnitOption::new("y", "Fast")]);
    assert_eq!(ctx.reference().business_units(&ClientId::new("c1")).len(), 1);
}

#[tokio::test]
async fn edit_submission_sends_changed_fields_as_old_and_new() {
    let server = MockServer::start().await;
    let ctx = signed_in_context(&server).await;
    mount_reference_lists(&server).await;
    mount_edited_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/business/getByClientForDropdown/c1"))
        .respond_with(ok(json!([{"_id": "b", "name": "Beta"}])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/edit"))
        .respond_with(ok(json!({"email": "g.hopper@example.com"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/list"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let form = ctx.edit_user_form(UserId::new("u1")).await.unwrap();
    form.update(|f| f.email = "g.hopper@example.com".into());

    let outcome = form.submit().await;
    assert!(outcome.success, "{outcome:?}");
    assert_eq!(
        ctx.users().selected().unwrap().email,
        "g.hopper@example.com"
    );

    let body = body_text(&requests_to(&server, "/admin/edit").await[0]);
    assert!(body.contains("name=\"newEmail\""));
    assert!(body.contains("g.hopper@example.com"));
    assert!(!body.contains("name=\"newMobileNumber\""));
    assert!(!body.contains("name=\"password\""));
}

#[tokio::test]
async fn backend_rejection_message_is_surfaced_verbatim() {
    let server = MockServer::start().await;
    let ctx = signed_in_context(&server).await;
    mount_reference_lists(&server).await;
    Mock::given(method("POST"))
        .and(path("/admin/add"))
        .respond_with(rejected("Email already exists"))
        .expect(1)
        .mount(&server)
        .await;

    let form = ctx.new_user_form().await.unwrap();
    form.update(|f| {
        f.first_name = "Grace".into();
        f.last_name = "Hopper".into();
        f.email = "grace@example.com".into();
        f.password = "hunter22".into();
        f.mobile_number = "5550100".into();
    });
    form.select_country("+1|us").unwrap();
    form.select_role(Some("r1".into()));
    form.update(|f| {
        f.client_id = Some(ClientId::new("c1"));
        f.business_unit_id = Some(BusinessUnitId::new("b"));
    });

    let outcome = form.submit().await;
    assert!(!outcome.success);
    assert_eq!(outcome.message.as_deref(), Some("Email already exists"));
    assert!(!outcome.session_expired());
}

#[tokio::test]
async fn list_keeps_the_bulk_page_and_treats_204_as_empty() {
    let server = MockServer::start().await;
    let ctx = signed_in_context(&server).await;
    Mock::given(method("GET"))
        .and(path("/admin/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "data": [edited_user()],
            "pagination": {"currentPage": 2, "totalPages": 3, "totalRecords": 21}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/list"))
        .and(query_param("search", "nobody"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let users = ctx.users();
    let page = users
        .list(ListParams {
            page: Some(2),
            ..ListParams::default()
        })
        .await
        .unwrap();
    assert_eq!(page.users.len(), 1);
    assert_eq!(page.pagination.total_records, 21);
    assert_eq!(users.users()[0].display_name(), "Grace Hopper");

    let empty = users
        .list(ListParams {
            search: Some("nobody".into()),
            ..ListParams::default()
        })
        .await
        .unwrap();
    assert!(empty.users.is_empty());
    assert_eq!(empty.pagination.current_page, 1);
    assert!(users.users().is_empty());
}

#[tokio::test]
async fn delete_sends_default_remark_and_unselects() {
    let server = MockServer::start().await;
    let ctx = signed_in_context(&server).await;
    mount_edited_user(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/admin/delete"))
        .and(body_json(json!({"id": "u1", "deleteRemark": "User no longer active"})))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/list"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let users = ctx.users();
    users.fetch_by_id(&UserId::new("u1")).await.unwrap();
    assert!(users.selected().is_some());

    let outcome = users.delete(&UserId::new("u1"), None).await;
    assert!(outcome.success);
    assert!(users.selected().is_none());
}

#[tokio::test]
async fn forms_need_a_signed_in_session() {
    let server = MockServer::start().await;
    let ctx = console_client::AppContext::start(config(&server), std::sync::Arc::new(console_client::MemoryStore::new()))
        .await
        .unwrap();
    let err = ctx.new_user_form().await.unwrap_err();
    assert_eq!(err, ClientError::NotAuthenticated);
}
