use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use learnhub_auth::{IdentityClaims, IdentityId};
use learnhub_infra::AppConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = learnhub_api::app::build_app(AppConfig::for_tests(SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn patch(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    /// Onboards a fresh company; returns the admin's token and profile.
    async fn onboard(&self, subject: &str, company: &str) -> (String, Value) {
        let token = mint_jwt(subject);
        let res = self.post(&token, "/onboarding", json!({ "companyName": company })).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (token, body["profile"].clone())
    }

    /// Registers `subject` in the admin's company with `role`.
    async fn add_profile(&self, admin: &str, subject: &str, role: &str) -> (String, Value) {
        let res = self
            .post(
                admin,
                "/profiles",
                json!({ "identityId": subject, "displayName": subject, "role": role }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        (mint_jwt(subject), res.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(subject: &str) -> String {
    let now = Utc::now();
    let claims = IdentityClaims {
        sub: IdentityId::new(subject),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
        email: Some(format!("{subject}@example.com")),
        name: None,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn json_ok(res: reqwest::Response, expected: StatusCode) -> Value {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    assert_eq!(status, expected, "body={body}");
    serde_json::from_str(&body).unwrap()
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

/// Course -> module -> lesson -> quiz block -> quiz. Returns the quiz id.
async fn quiz_in(srv: &TestServer, token: &str, course_id: &str) -> String {
    let module = json_ok(
        srv.post(token, &format!("/courses/{course_id}/modules"), json!({ "title": "Basics" }))
            .await,
        StatusCode::CREATED,
    )
    .await;
    let lesson = json_ok(
        srv.post(
            token,
            &format!("/courses/{course_id}/modules/{}/lessons", id(&module)),
            json!({ "title": "Hazards" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let block = json_ok(
        srv.post(
            token,
            &format!("/courses/{course_id}/lessons/{}/blocks", id(&lesson)),
            json!({ "kind": "QUIZ" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let quiz = json_ok(
        srv.post(
            token,
            &format!("/courses/{course_id}/blocks/{}/quiz", id(&block)),
            json!({ "title": "Check" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    id(&quiz)
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("not-a-jwt", "/courses").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn identity_without_profile_gets_not_found_until_onboarded() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt("idp|newcomer");

    let res = srv.get(&token, "/courses").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Profile not found");

    let whoami = json_ok(srv.get(&token, "/whoami").await, StatusCode::OK).await;
    assert!(whoami["profile"].is_null());

    srv.onboard("idp|newcomer", "Acme").await;

    let whoami = json_ok(srv.get(&token, "/whoami").await, StatusCode::OK).await;
    assert_eq!(whoami["identity"], "idp|newcomer");
    assert_eq!(whoami["profile"]["role"], "HR_ADMIN");
    assert_eq!(whoami["company"]["name"], "Acme");

    let res = srv.post(&token, "/onboarding", json!({ "companyName": "Again" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn course_publication_workflow() {
    let srv = TestServer::spawn().await;
    let (admin, profile) = srv.onboard("idp|hr", "Acme").await;

    let course = json_ok(
        srv.post(&admin, "/courses", json!({ "title": "Onboarding" })).await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(course["isPublished"], false);
    let course_id = id(&course);

    let mine = json_ok(srv.get(&admin, "/me/enrollments").await, StatusCode::OK).await;
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["courseId"], course_id.as_str());
    assert_eq!(mine[0]["profileId"], profile["id"]);
    assert_eq!(mine[0]["source"], "MANUAL");

    let chapter = json_ok(
        srv.post(
            &admin,
            &format!("/courses/{course_id}/chapters"),
            json!({ "title": "Intro", "description": "Welcome" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let chapter_path = format!("/courses/{course_id}/chapters/{}", id(&chapter));

    let res = srv.patch(&admin, &format!("{chapter_path}/publish"), json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "Missing required fields");

    json_ok(
        srv.patch(&admin, &chapter_path, json!({ "videoUrl": "https://cdn.example.com/intro.mp4" }))
            .await,
        StatusCode::OK,
    )
    .await;
    let published = json_ok(
        srv.patch(&admin, &format!("{chapter_path}/publish"), json!({})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(published["isPublished"], true);

    let course = json_ok(
        srv.patch(&admin, &format!("/courses/{course_id}/publish"), json!({})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(course["isPublished"], true);

    let unpublished = json_ok(
        srv.patch(&admin, &format!("{chapter_path}/unpublish"), json!({})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(unpublished["isPublished"], false);
    assert_eq!(unpublished["courseUnpublished"], true);

    let course = json_ok(srv.get(&admin, &format!("/courses/{course_id}")).await, StatusCode::OK).await;
    assert_eq!(course["isPublished"], false);
}

#[tokio::test]
async fn learners_cannot_author_and_do_not_see_drafts() {
    let srv = TestServer::spawn().await;
    let (admin, _) = srv.onboard("idp|hr", "Acme").await;
    let (learner, _) = srv.add_profile(&admin, "idp|learner", "LEARNER").await;

    let res = srv.post(&learner, "/courses", json!({ "title": "Mine" })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let draft = json_ok(
        srv.post(&admin, "/courses", json!({ "title": "Draft" })).await,
        StatusCode::CREATED,
    )
    .await;

    let res = srv.get(&learner, &format!("/courses/{}", id(&draft))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let listed = json_ok(srv.get(&learner, "/courses").await, StatusCode::OK).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn quiz_attempts_are_capped() {
    let srv = TestServer::spawn().await;
    let (admin, _) = srv.onboard("idp|hr", "Acme").await;
    let (learner, _) = srv.add_profile(&admin, "idp|learner", "LEARNER").await;

    let course = json_ok(
        srv.post(&admin, "/courses", json!({ "title": "Safety" })).await,
        StatusCode::CREATED,
    )
    .await;
    let course_id = id(&course);
    let module = json_ok(
        srv.post(&admin, &format!("/courses/{course_id}/modules"), json!({ "title": "Basics" }))
            .await,
        StatusCode::CREATED,
    )
    .await;
    let lesson = json_ok(
        srv.post(
            &admin,
            &format!("/courses/{course_id}/modules/{}/lessons", id(&module)),
            json!({ "title": "Hazards" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let block = json_ok(
        srv.post(
            &admin,
            &format!("/courses/{course_id}/lessons/{}/blocks", id(&lesson)),
            json!({ "kind": "QUIZ" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let quiz = json_ok(
        srv.post(
            &admin,
            &format!("/courses/{course_id}/blocks/{}/quiz", id(&block)),
            json!({ "title": "Check", "maxAttempts": 2 }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let quiz_id = id(&quiz);
    let question = json_ok(
        srv.post(&admin, &format!("/quizzes/{quiz_id}/questions"), json!({ "prompt": "Exit?" }))
            .await,
        StatusCode::CREATED,
    )
    .await;
    let correct = json_ok(
        srv.post(
            &admin,
            &format!("/quizzes/{quiz_id}/questions/{}/options", id(&question)),
            json!({ "text": "Stairs", "isCorrect": true }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;

    json_ok(
        srv.patch(&admin, &format!("/courses/{course_id}/publish"), json!({})).await,
        StatusCode::OK,
    )
    .await;

    let view = json_ok(srv.get(&learner, &format!("/quizzes/{quiz_id}")).await, StatusCode::OK).await;
    assert!(view["questions"][0]["options"][0].get("isCorrect").is_none());

    let attempts = format!("/quizzes/{quiz_id}/attempts");
    let first = json_ok(srv.post(&learner, &attempts, json!({})).await, StatusCode::CREATED).await;
    assert_eq!(first["attemptNumber"], 1);

    let graded = json_ok(
        srv.post(
            &learner,
            &format!("{attempts}/{}/submit", id(&first)),
            json!({ "answers": [{ "questionId": id(&question), "optionId": id(&correct) }] }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(graded["score"], 100);
    assert_eq!(graded["passed"], true);

    let second = json_ok(srv.post(&learner, &attempts, json!({})).await, StatusCode::CREATED).await;
    assert_eq!(second["attemptNumber"], 2);

    let res = srv.post(&learner, &attempts, json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "Max attempts reached");

    // Someone else's attempt does not exist for the admin.
    let res = srv.get(&admin, &format!("{attempts}/{}", id(&first))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_membership_is_an_upsert_and_assignment_enrolls_members() {
    let srv = TestServer::spawn().await;
    let (admin, _) = srv.onboard("idp|hr", "Acme").await;
    let (learner, learner_profile) = srv.add_profile(&admin, "idp|learner", "LEARNER").await;

    let team = json_ok(
        srv.post(&admin, "/teams", json!({ "name": "Ops" })).await,
        StatusCode::CREATED,
    )
    .await;
    let members = format!("/teams/{}/members", id(&team));

    for role in ["MEMBER", "LEAD"] {
        json_ok(
            srv.post(&admin, &members, json!({ "profileId": id(&learner_profile), "role": role }))
                .await,
            StatusCode::CREATED,
        )
        .await;
    }
    let listed = json_ok(srv.get(&admin, &members).await, StatusCode::OK).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["role"], "LEAD");

    let course = json_ok(
        srv.post(&admin, "/courses", json!({ "title": "Ops 101" })).await,
        StatusCode::CREATED,
    )
    .await;
    let assigned = json_ok(
        srv.post(
            &admin,
            &format!("/teams/{}/courses", id(&team)),
            json!({ "courseId": id(&course) }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(assigned["enrolled"], 1);

    let mine = json_ok(srv.get(&learner, "/me/enrollments").await, StatusCode::OK).await;
    assert_eq!(mine[0]["source"], "TEAM");

    let progress = json_ok(
        srv.patch(
            &learner,
            &format!("/enrollments/{}/progress", id(&mine[0])),
            json!({ "progress": 100 }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(progress["status"], "COMPLETED");

    let res = srv
        .patch(
            &learner,
            &format!("/enrollments/{}/progress", id(&mine[0])),
            json!({ "progress": 101 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenants_cannot_see_each_other() {
    let srv = TestServer::spawn().await;
    let (acme, _) = srv.onboard("idp|acme", "Acme").await;
    let (globex, _) = srv.onboard("idp|globex", "Globex").await;

    let course = json_ok(
        srv.post(&acme, "/courses", json!({ "title": "Secret" })).await,
        StatusCode::CREATED,
    )
    .await;
    let path = format!("/courses/{}", id(&course));

    let res = srv.get(&globex, &path).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.patch(&globex, &path, json!({ "title": "Mine now" })).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let listed = json_ok(srv.get(&globex, "/courses").await, StatusCode::OK).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn trainers_only_edit_courses_they_created() {
    let srv = TestServer::spawn().await;
    let (admin, _) = srv.onboard("idp|hr", "Acme").await;
    let (owner, _) = srv.add_profile(&admin, "idp|trainer-a", "TRAINER").await;
    let (other, _) = srv.add_profile(&admin, "idp|trainer-b", "TRAINER").await;

    let course = json_ok(
        srv.post(&owner, "/courses", json!({ "title": "Forklifts" })).await,
        StatusCode::CREATED,
    )
    .await;
    let path = format!("/courses/{}", id(&course));

    let res = srv.patch(&other, &path, json!({ "title": "Taken over" })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv.patch(&other, &format!("{path}/publish"), json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv.post(&other, &format!("{path}/chapters"), json!({ "title": "Extra" })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let renamed = json_ok(
        srv.patch(&owner, &path, json!({ "title": "Forklift safety" })).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(renamed["title"], "Forklift safety");
    let published = json_ok(
        srv.patch(&owner, &format!("{path}/publish"), json!({})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(published["isPublished"], true);

    // HR admins edit any course in their company.
    json_ok(
        srv.patch(&admin, &format!("{path}/unpublish"), json!({})).await,
        StatusCode::OK,
    )
    .await;
}

#[tokio::test]
async fn trainers_only_undo_team_changes_they_made() {
    let srv = TestServer::spawn().await;
    let (admin, _) = srv.onboard("idp|hr", "Acme").await;
    let (owner, _) = srv.add_profile(&admin, "idp|trainer-a", "TRAINER").await;
    let (other, _) = srv.add_profile(&admin, "idp|trainer-b", "TRAINER").await;
    let (_, learner) = srv.add_profile(&admin, "idp|learner", "LEARNER").await;

    let res = srv.post(&owner, "/teams", json!({ "name": "Warehouse" })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let team = json_ok(
        srv.post(&admin, "/teams", json!({ "name": "Warehouse" })).await,
        StatusCode::CREATED,
    )
    .await;
    let team_path = format!("/teams/{}", id(&team));

    json_ok(
        srv.post(
            &owner,
            &format!("{team_path}/members"),
            json!({ "profileId": id(&learner), "role": "MEMBER" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let member_path = format!("{team_path}/members/{}", id(&learner));

    let course = json_ok(
        srv.post(&owner, "/courses", json!({ "title": "Pallets" })).await,
        StatusCode::CREATED,
    )
    .await;
    let assigned = json_ok(
        srv.post(&owner, &format!("{team_path}/courses"), json!({ "courseId": id(&course) }))
            .await,
        StatusCode::CREATED,
    )
    .await;
    let assignment_path = format!("{team_path}/courses/{}", id(&assigned));

    let res = srv.delete(&other, &member_path).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv.delete(&other, &assignment_path).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let assignments = json_ok(srv.get(&admin, &format!("{team_path}/courses")).await, StatusCode::OK).await;
    assert_eq!(assignments.as_array().unwrap().len(), 1);

    let res = srv.delete(&owner, &assignment_path).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = srv.delete(&owner, &member_path).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let members = json_ok(srv.get(&admin, &format!("{team_path}/members")).await, StatusCode::OK).await;
    assert!(members.as_array().unwrap().is_empty());
    let assignments = json_ok(srv.get(&admin, &format!("{team_path}/courses")).await, StatusCode::OK).await;
    assert!(assignments.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn tenant_scoping_covers_every_resource() {
    let srv = TestServer::spawn().await;
    let (acme, _) = srv.onboard("idp|acme", "Acme").await;
    let (acme_learner, _) = srv.add_profile(&acme, "idp|acme-learner", "LEARNER").await;
    let (globex, _) = srv.onboard("idp|globex", "Globex").await;

    let team = json_ok(
        srv.post(&acme, "/teams", json!({ "name": "Ops" })).await,
        StatusCode::CREATED,
    )
    .await;
    let team_path = format!("/teams/{}", id(&team));

    let course = json_ok(
        srv.post(&acme, "/courses", json!({ "title": "Safety" })).await,
        StatusCode::CREATED,
    )
    .await;
    let course_id = id(&course);
    let quiz_id = quiz_in(&srv, &acme, &course_id).await;
    json_ok(
        srv.patch(&acme, &format!("/courses/{course_id}/publish"), json!({})).await,
        StatusCode::OK,
    )
    .await;
    let attempt = json_ok(
        srv.post(&acme_learner, &format!("/quizzes/{quiz_id}/attempts"), json!({})).await,
        StatusCode::CREATED,
    )
    .await;
    let attempt_path = format!("/quizzes/{quiz_id}/attempts/{}", id(&attempt));

    let attachment = json_ok(
        srv.post(
            &acme,
            &format!("/courses/{course_id}/attachments"),
            json!({ "name": "Handbook", "url": "https://files.example/handbook.pdf" }),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let attachment_path = format!("/courses/{course_id}/attachments/{}", id(&attachment));

    let enrollments = json_ok(srv.get(&acme, "/me/enrollments").await, StatusCode::OK).await;
    let progress_path = format!("/enrollments/{}/progress", id(&enrollments[0]));

    let not_found = [
        srv.get(&globex, &team_path).await,
        srv.patch(&globex, &team_path, json!({ "name": "Mine now" })).await,
        srv.delete(&globex, &team_path).await,
        srv.get(&globex, &format!("{team_path}/members")).await,
        srv.get(&globex, &format!("/quizzes/{quiz_id}")).await,
        srv.post(&globex, &format!("/quizzes/{quiz_id}/questions"), json!({ "prompt": "?" }))
            .await,
        srv.post(&globex, &format!("/quizzes/{quiz_id}/attempts"), json!({})).await,
        srv.get(&globex, &attempt_path).await,
        srv.post(&globex, &format!("{attempt_path}/submit"), json!({ "answers": [] }))
            .await,
        srv.patch(&globex, &progress_path, json!({ "progress": 50 })).await,
        srv.get(&globex, &format!("/courses/{course_id}/attachments")).await,
        srv.delete(&globex, &attachment_path).await,
    ];
    for res in not_found {
        let url = res.url().clone();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{url}");
    }

    // Nothing in Acme changed.
    let team = json_ok(srv.get(&acme, &team_path).await, StatusCode::OK).await;
    assert_eq!(team["name"], "Ops");
    let attachments = json_ok(
        srv.get(&acme, &format!("/courses/{course_id}/attachments")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(attachments.as_array().unwrap().len(), 1);
    let attempt = json_ok(srv.get(&acme_learner, &attempt_path).await, StatusCode::OK).await;
    assert_eq!(attempt["status"], "IN_PROGRESS");
}
