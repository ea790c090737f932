//! REST round trips against a live server on an ephemeral port.

#![cfg(all(feature = "server", feature = "client"))]

use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use coachdesk::api::{ErrorBody, HealthResponse, MeResponse, NewExercise, StudentDashboard, UnreadCount};
use coachdesk::client::AdminClient;
use coachdesk::training::ExerciseType;
use coachdesk::{
    transport, CoachError, Content, ContentDraft, LandingArea, Platform, Registration, Role,
    StudentProfessionalLink, TransportError, UserView, DEMO_PASSWORD,
};

const FRONTEND: &str = "http://localhost:3000";

struct Server {
    base: String,
    http: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
}

impl Server {
    async fn start() -> Self {
        let platform = Platform::in_memory();
        platform.seed_demo_data().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        let origins = transport::parse_origins(&[FRONTEND.to_string()]).unwrap();
        let app = transport::router(platform, &origins);
        tokio::spawn(transport::serve(listener, app, async move {
            let _ = stopped.await;
        }));

        Self {
            base,
            http: reqwest::Client::new(),
            stop: Some(stop),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn admin(&self, username: &str) -> AdminClient {
        AdminClient::new(&self.base, username, DEMO_PASSWORD).unwrap()
    }

    fn get(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.http.get(self.url(path)).basic_auth(user, Some(DEMO_PASSWORD))
    }

    fn post(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.http.post(self.url(path)).basic_auth(user, Some(DEMO_PASSWORD))
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_admin_client_workflow() {
    let server = Server::start().await;
    let admin = server.admin("admin1");

    let health: HealthResponse = admin.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(admin.list_users().await.unwrap().len(), 6);
    assert!(admin.pending_professionals().await.unwrap().is_empty());

    let registration = Registration::builder()
        .username("newcoach")
        .password("secret")
        .email("newcoach@example.com")
        .full_name("New Coach")
        .role(Role::Coach)
        .register("CREF-9")
        .build()
        .unwrap();
    let response = server
        .http
        .post(server.url("/register"))
        .json(&registration)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: UserView = response.json().await.unwrap();
    assert!(!created.active);

    let pending = admin.pending_professionals().await.unwrap();
    assert_eq!(pending.len(), 1);
    let approved = admin.approve_professional(created.id).await.unwrap();
    assert!(approved.active);

    let exercise = admin
        .add_exercise(&NewExercise {
            name: "Kettlebell Swing".to_string(),
            description: "Hinge and snap the hips.".to_string(),
            video_link: None,
            exercise_type: ExerciseType::FreeWeights,
            muscle_groups: Vec::new(),
        })
        .await
        .unwrap();
    assert_eq!(exercise.name, "Kettlebell Swing");

    let report = admin.run_sweep().await.unwrap();
    assert_eq!(report.expired_links, 0);

    let removed = admin.remove_user(created.id).await.unwrap();
    assert_eq!(removed.username, "newcoach");
    assert_eq!(admin.list_users().await.unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_errors_map_to_statuses() {
    let server = Server::start().await;

    let anonymous = server.http.get(server.url("/me")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert!(anonymous.headers().contains_key("www-authenticate"));
    let body: ErrorBody = anonymous.json().await.unwrap();
    assert_eq!(body.error, "unauthenticated");

    let wrong = server
        .http
        .get(server.url("/me"))
        .basic_auth("coach1", Some("nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    // A professional is not an administrator.
    let err = server.admin("coach1").list_users().await.unwrap_err();
    match err {
        CoachError::Transport(TransportError::ServerError { status, .. }) => assert_eq!(status, 403),
        other => panic!("unexpected error: {other}"),
    }

    let missing = server
        .post(&format!("/admin/api/approve/{}", coachdesk::UserId::new()), "admin1")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let duplicate = Registration::builder()
        .username("coach1")
        .password("secret")
        .email("other@example.com")
        .full_name("Copy")
        .role(Role::Student)
        .build()
        .unwrap();
    let taken = server
        .http
        .post(server.url("/register"))
        .json(&duplicate)
        .send()
        .await
        .unwrap();
    assert_eq!(taken.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_student_and_professional_dashboards() {
    let server = Server::start().await;

    // The seeded student cannot log in until a professional accepts.
    let inactive = server.get("/student/dashboard", "student").send().await.unwrap();
    assert_eq!(inactive.status(), StatusCode::UNAUTHORIZED);

    let links: Vec<StudentProfessionalLink> = server
        .get("/professional/links?status=PENDING", "coach1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    let accepted = server
        .post(&format!("/professional/links/{}/accept", links[0].id), "coach1")
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    let twice = server
        .post(&format!("/professional/links/{}/accept", links[0].id), "coach1")
        .send()
        .await
        .unwrap();
    assert_eq!(twice.status(), StatusCode::CONFLICT);

    let draft = ContentDraft::diet("Cut", "Lean protein, vegetables")
        .description("Four weeks")
        .build()
        .unwrap();
    let created = server
        .post("/professional/content", "coach1")
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let diet: Content = created.json().await.unwrap();

    let me: MeResponse = server.get("/me", "student").send().await.unwrap().json().await.unwrap();
    assert_eq!(me.landing, LandingArea::Student);

    let dashboard: StudentDashboard = server
        .get("/student/dashboard", "student")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard.links.len(), 3);
    assert_eq!(dashboard.content.len(), 1);
    assert!(dashboard.unread_notifications >= 1);

    let seen: Content = server
        .get(&format!("/student/content/{}", diet.id), "student")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen.name, "Cut");

    // Students stay out of the professional area.
    let forbidden = server.get("/professional/content", "student").send().await.unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let read_all = server
        .post("/me/notifications/read-all", "student")
        .send()
        .await
        .unwrap();
    assert_eq!(read_all.status(), StatusCode::OK);
    let unread: UnreadCount = server
        .get("/me/notifications/unread", "student")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread.unread, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cors_only_for_configured_origins() {
    let server = Server::start().await;

    let allowed = server
        .http
        .get(server.url("/health"))
        .header("origin", FRONTEND)
        .send()
        .await
        .unwrap();
    assert_eq!(
        allowed.headers().get("access-control-allow-origin").unwrap(),
        FRONTEND
    );

    let foreign = server
        .http
        .get(server.url("/health"))
        .header("origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::OK);
    assert!(foreign.headers().get("access-control-allow-origin").is_none());
}
