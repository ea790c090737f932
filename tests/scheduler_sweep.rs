//! Daily sweep: link expiry, escalation to administrators and scheduled
//! account deletion, all driven by a manual clock.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use coachdesk::{
    ContentDraft, LinkStatus, ManualClock, NotificationKind, Platform, Registration, Role, Stores,
    StudentProfessionalLink, SweepPolicy, User, UserId,
};

fn setup() -> (Platform, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 1, 0, 0).unwrap()));
    let platform = Platform::new(Stores::in_memory(), clock.clone(), SweepPolicy::default());
    (platform, clock)
}

fn admin(platform: &Platform, name: &str) -> User {
    platform
        .register_administrator(
            Registration::builder()
                .username(name)
                .password("secret")
                .email(format!("{name}@example.com"))
                .full_name(name)
                .role(Role::Administrator)
                .build()
                .unwrap(),
        )
        .unwrap()
}

fn coach(platform: &Platform, name: &str) -> User {
    let user = platform
        .register(
            Registration::builder()
                .username(name)
                .password("secret")
                .email(format!("{name}@example.com"))
                .full_name(name)
                .role(Role::Coach)
                .register("CREF")
                .build()
                .unwrap(),
        )
        .unwrap();
    platform.approve_professional(user.id).unwrap()
}

fn student(platform: &Platform, name: &str, professionals: &[UserId]) -> User {
    let mut builder = Registration::builder()
        .username(name)
        .password("secret")
        .email(format!("{name}@example.com"))
        .full_name(name)
        .role(Role::Student);
    for id in professionals {
        builder = builder.link_with(*id);
    }
    platform.register(builder.build().unwrap()).unwrap()
}

fn escalations(platform: &Platform, user: UserId) -> usize {
    platform
        .inbox(user)
        .unwrap()
        .iter()
        .filter(|i| i.notification.kind == NotificationKind::SystemAlert)
        .count()
}

#[test]
fn test_fresh_links_are_untouched() {
    let (platform, clock) = setup();
    let a = admin(&platform, "admin");
    let c = coach(&platform, "coach");
    student(&platform, "sam", &[c.id]);

    clock.advance(Duration::days(6));
    let report = platform.run_sweep().unwrap();
    assert_eq!(report.expired_links, 0);
    assert_eq!(report.escalated_links, 0);
    assert!(report.deleted_users.is_empty());
    assert_eq!(escalations(&platform, a.id), 0);
}

#[test]
fn test_week_old_links_escalate_to_every_admin() {
    let (platform, clock) = setup();
    let first = admin(&platform, "admin1");
    let second = admin(&platform, "admin2");
    let c = coach(&platform, "coach");
    student(&platform, "sam", &[c.id]);
    student(&platform, "kim", &[c.id]);

    clock.advance(Duration::days(8));
    let report = platform.run_sweep().unwrap();
    assert_eq!(report.expired_links, 0);
    assert_eq!(report.escalated_links, 2);
    assert_eq!(report.administrators_alerted, 2);
    assert_eq!(report.ran_at, Some(clock_now(&clock)));

    for id in [first.id, second.id] {
        let alert = platform
            .inbox(id)
            .unwrap()
            .into_iter()
            .find(|i| i.notification.kind == NotificationKind::SystemAlert)
            .unwrap();
        assert!(alert.notification.body.starts_with("2 student link requests"));
    }
    // Escalation keeps the links.
    assert_eq!(
        platform.links_for_professional(c.id, &[LinkStatus::Pending]).unwrap().len(),
        2
    );
}

#[test]
fn test_month_old_links_expire_without_escalation() {
    let (platform, clock) = setup();
    let a = admin(&platform, "admin");
    let c = coach(&platform, "coach");
    let sam = student(&platform, "sam", &[c.id]);

    clock.advance(Duration::days(32));
    let report = platform.run_sweep().unwrap();
    assert_eq!(report.expired_links, 1);
    assert_eq!(report.escalated_links, 0);
    assert!(platform.links_for_student(sam.id, &[]).unwrap().is_empty());
    assert_eq!(escalations(&platform, a.id), 0);
}

#[test]
fn test_accepted_links_never_expire() {
    let (platform, clock) = setup();
    let c = coach(&platform, "coach");
    let sam = student(&platform, "sam", &[c.id]);
    let link = platform.links_for_student(sam.id, &[]).unwrap().remove(0);
    platform.accept_link(link.id, c.id).unwrap();

    clock.advance(Duration::days(400));
    let report = platform.run_sweep().unwrap();
    assert_eq!(report.expired_links, 0);
    assert!(platform.is_active_link(sam.id, c.id).unwrap());
}

#[test]
fn test_deactivated_account_is_deleted_after_grace_period() {
    let (platform, clock) = setup();
    let c = coach(&platform, "coach");
    let sam = student(&platform, "sam", &[c.id]);
    let link = platform.links_for_student(sam.id, &[]).unwrap().remove(0);
    platform.accept_link(link.id, c.id).unwrap();
    platform
        .create_content(c.id, ContentDraft::diet("Bulk", "Eat more").build().unwrap())
        .unwrap();

    let deactivated = platform.request_deactivation(sam.id).unwrap();
    assert!(!deactivated.active);
    let schedule = platform.stores().schedules.get_schedule(sam.id).unwrap().unwrap();
    assert_eq!(
        schedule.scheduled_deletion_at,
        Utc.with_ymd_and_hms(2024, 2, 15, 1, 0, 0).unwrap()
    );
    // A second request keeps the original schedule.
    platform.request_deactivation(sam.id).unwrap();
    assert_eq!(
        platform.stores().schedules.get_schedule(sam.id).unwrap().unwrap(),
        schedule
    );

    clock.advance(Duration::days(20));
    assert!(platform.run_sweep().unwrap().deleted_users.is_empty());
    assert!(platform.get_user(sam.id).unwrap().is_some());

    clock.advance(Duration::days(15));
    let report = platform.run_sweep().unwrap();
    assert_eq!(report.deleted_users, vec![sam.id]);
    assert!(platform.get_user(sam.id).unwrap().is_none());
    assert!(platform.links_for_professional(c.id, &[]).unwrap().is_empty());
    let ended = platform.inbox(c.id).unwrap().remove(0).notification;
    assert_eq!(ended.title, "Link ended");

    let stamped = platform.stores().schedules.get_schedule(sam.id).unwrap().unwrap();
    assert_eq!(stamped.actual_deletion_at, Some(clock_now(&clock)));

    // The sweep never deletes twice.
    clock.advance(Duration::days(1));
    assert!(platform.run_sweep().unwrap().deleted_users.is_empty());
}

#[test]
fn test_sweep_deletes_dual_role_account_with_self_link() {
    let (platform, clock) = setup();
    let dual = platform
        .register(
            Registration::builder()
                .username("dual")
                .password("secret")
                .email("dual@example.com")
                .full_name("Dana Dual")
                .role(Role::Student)
                .role(Role::Coach)
                .register("CREF")
                .build()
                .unwrap(),
        )
        .unwrap();
    platform.approve_professional(dual.id).unwrap();
    // Accepted, so the expiry step leaves it for the account purge.
    let mut self_link = StudentProfessionalLink::pending(dual.id, dual.id, clock_now(&clock));
    self_link.accept().unwrap();
    platform.stores().links.insert_link(self_link).unwrap();

    platform.request_deactivation(dual.id).unwrap();
    clock.advance(Duration::days(35));
    let report = platform.run_sweep().unwrap();

    assert_eq!(report.deleted_users, vec![dual.id]);
    assert!(platform.get_user(dual.id).unwrap().is_none());
    assert!(platform.links_for_student(dual.id, &[]).unwrap().is_empty());
}

#[test]
fn test_failed_login_alert_fires_once_at_threshold() {
    let (platform, _clock) = setup();
    let c = coach(&platform, "coach");
    let threshold = platform.policy().failed_login_alert_threshold;

    for _ in 0..threshold + 2 {
        assert!(platform.authenticate("coach", "wrong").unwrap_err().is_unauthenticated());
    }
    assert_eq!(escalations(&platform, c.id), 1);
    assert_eq!(
        platform.get_user(c.id).unwrap().unwrap().failed_login_attempts,
        threshold + 2
    );

    platform.authenticate("coach", "secret").unwrap();
    assert_eq!(platform.get_user(c.id).unwrap().unwrap().failed_login_attempts, 0);
}

fn clock_now(clock: &ManualClock) -> chrono::DateTime<Utc> {
    use coachdesk::Clock;
    clock.now()
}
