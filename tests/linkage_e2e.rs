//! End-to-end tests for the student-professional link lifecycle.
//!
//! These tests drive the public platform API:
//! - registration creating pending links and notifying professionals
//! - acceptance activating the student
//! - rejection by removal, and removal of accepted links
//! - guards against outsiders and double acceptance
//! - accounts holding both the student and a professional role

use chrono::Utc;
use coachdesk::{LinkStatus, Platform, Registration, Role, StudentProfessionalLink, User, UserId};

fn professional(platform: &Platform, username: &str, role: Role) -> User {
    let user = platform
        .register(
            Registration::builder()
                .username(username)
                .password("secret")
                .email(format!("{username}@example.com"))
                .full_name(format!("Pro {username}"))
                .role(role)
                .register("REG-42")
                .build()
                .unwrap(),
        )
        .unwrap();
    platform.approve_professional(user.id).unwrap()
}

fn student(platform: &Platform, username: &str, professionals: &[UserId]) -> User {
    let mut builder = Registration::builder()
        .username(username)
        .password("secret")
        .email(format!("{username}@example.com"))
        .full_name(format!("Student {username}"))
        .role(Role::Student);
    for id in professionals {
        builder = builder.link_with(*id);
    }
    platform.register(builder.build().unwrap()).unwrap()
}

#[test]
fn test_registration_creates_pending_links() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let nutritionist = professional(&platform, "nutri", Role::Nutritionist);
    let sam = student(&platform, "sam", &[coach.id, nutritionist.id]);

    assert!(!sam.active);
    let links = platform.links_for_student(sam.id, &[LinkStatus::Pending]).unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l.student == sam.id));

    let requests = platform.inbox(coach.id).unwrap();
    assert!(requests.iter().any(|i| i.notification.title == "New link request"));

    // Inactive until a professional accepts.
    let err = platform.authenticate("sam", "secret").unwrap_err();
    assert!(err.is_unauthenticated());
}

#[test]
fn test_accept_activates_student_once() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let psych = professional(&platform, "psych", Role::Psychologist);
    let sam = student(&platform, "sam", &[coach.id, psych.id]);

    let to_coach = platform.links_for_professional(coach.id, &[]).unwrap().remove(0);
    let accepted = platform.accept_link(to_coach.id, coach.id).unwrap();
    assert_eq!(accepted.status, LinkStatus::Accepted);
    assert!(platform.is_active_link(sam.id, coach.id).unwrap());
    assert!(!platform.is_active_link(sam.id, psych.id).unwrap());

    let principal = platform.authenticate("sam", "secret").unwrap();
    assert_eq!(principal.user_id, sam.id);

    let to_psych = platform.links_for_professional(psych.id, &[]).unwrap().remove(0);
    platform.accept_link(to_psych.id, psych.id).unwrap();

    let activations = platform
        .inbox(sam.id)
        .unwrap()
        .into_iter()
        .filter(|i| i.notification.title == "Account activated")
        .count();
    assert_eq!(activations, 1);
    assert_eq!(
        platform.inbox(coach.id).unwrap()[0].notification.title,
        "Link accepted"
    );
}

#[test]
fn test_later_acceptance_keeps_deactivated_account_inactive() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let nutritionist = professional(&platform, "nutri", Role::Nutritionist);
    let sam = student(&platform, "sam", &[coach.id, nutritionist.id]);

    let to_coach = platform.links_for_professional(coach.id, &[]).unwrap().remove(0);
    platform.accept_link(to_coach.id, coach.id).unwrap();
    platform.request_deactivation(sam.id).unwrap();

    let to_nutritionist = platform.links_for_professional(nutritionist.id, &[]).unwrap().remove(0);
    platform.accept_link(to_nutritionist.id, nutritionist.id).unwrap();

    assert!(!platform.get_user(sam.id).unwrap().unwrap().active);
    assert!(platform.authenticate("sam", "secret").unwrap_err().is_unauthenticated());
    let activations = platform
        .inbox(sam.id)
        .unwrap()
        .into_iter()
        .filter(|i| i.notification.title == "Account activated")
        .count();
    assert_eq!(activations, 1);
    assert!(platform.stores().schedules.get_schedule(sam.id).unwrap().is_some());
}

#[test]
fn test_only_linked_professional_accepts_from_pending() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let other = professional(&platform, "other", Role::Coach);
    let sam = student(&platform, "sam", &[coach.id]);
    let link = platform.links_for_student(sam.id, &[]).unwrap().remove(0);

    assert!(platform.accept_link(link.id, other.id).unwrap_err().is_access());

    platform.accept_link(link.id, coach.id).unwrap();
    let again = platform.accept_link(link.id, coach.id).unwrap_err();
    assert!(again.is_conflict());
}

#[test]
fn test_rejection_is_removal() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let sam = student(&platform, "sam", &[coach.id]);
    let link = platform.links_for_student(sam.id, &[]).unwrap().remove(0);

    platform.remove_link(link.id, coach.id).unwrap();
    assert!(platform.get_link(link.id).unwrap().is_none());

    let ended = platform.inbox(sam.id).unwrap().remove(0).notification;
    assert_eq!(ended.title, "Link ended");
    assert_eq!(ended.sender, Some(coach.id));
    assert!(ended.body.contains("professional"));

    // The student may ask again once the old link is gone.
    let relinked = platform.create_pending_links(sam.id, &[coach.id]).unwrap();
    assert_eq!(relinked.len(), 1);
}

#[test]
fn test_student_removes_accepted_link() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let sam = student(&platform, "sam", &[coach.id]);
    let link = platform.links_for_student(sam.id, &[]).unwrap().remove(0);
    platform.accept_link(link.id, coach.id).unwrap();

    let outsider = student(&platform, "eve", &[]);
    assert!(platform.remove_link(link.id, outsider.id).unwrap_err().is_access());

    platform.remove_link(link.id, sam.id).unwrap();
    assert!(!platform.is_active_link(sam.id, coach.id).unwrap());
    let ended = platform.inbox(coach.id).unwrap().remove(0).notification;
    assert!(ended.body.contains("student Student sam"));
}

#[test]
fn test_duplicate_links_are_rejected() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let sam = student(&platform, "sam", &[coach.id]);

    let err = platform.create_pending_links(sam.id, &[coach.id]).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(platform.links_for_student(sam.id, &[]).unwrap().len(), 1);

    // Students cannot link with non-professionals.
    let eve = student(&platform, "eve", &[]);
    assert!(platform.create_pending_links(sam.id, &[eve.id]).unwrap_err().is_validation());
}

fn dual_role(platform: &Platform, username: &str) -> User {
    let user = platform
        .register(
            Registration::builder()
                .username(username)
                .password("secret")
                .email(format!("{username}@example.com"))
                .full_name(format!("Dual {username}"))
                .role(Role::Student)
                .role(Role::Coach)
                .register("REG-7")
                .build()
                .unwrap(),
        )
        .unwrap();
    platform.approve_professional(user.id).unwrap()
}

#[test]
fn test_dual_role_user_cannot_link_with_themselves() {
    let platform = Platform::in_memory();
    let dual = dual_role(&platform, "dual");

    let err = platform.create_pending_links(dual.id, &[dual.id]).unwrap_err();
    assert!(err.is_validation());
    assert!(platform.links_for_student(dual.id, &[]).unwrap().is_empty());
    assert!(platform.links_for_professional(dual.id, &[]).unwrap().is_empty());
}

#[test]
fn test_remove_dual_role_user_clears_both_sides() {
    let platform = Platform::in_memory();
    let coach = professional(&platform, "coach", Role::Coach);
    let dual = dual_role(&platform, "dual");
    let sam = student(&platform, "sam", &[dual.id]);
    platform.create_pending_links(dual.id, &[coach.id]).unwrap();

    // A self-link left over from before such links were refused.
    platform
        .stores()
        .links
        .insert_link(StudentProfessionalLink::pending(dual.id, dual.id, Utc::now()))
        .unwrap();

    let removed = platform.remove_user(dual.id).unwrap();
    assert_eq!(removed.id, dual.id);
    assert!(platform.get_user(dual.id).unwrap().is_none());
    assert!(platform.links_for_student(sam.id, &[]).unwrap().is_empty());
    assert!(platform.links_for_professional(coach.id, &[]).unwrap().is_empty());
    assert_eq!(platform.inbox(sam.id).unwrap()[0].notification.title, "Link ended");
    assert_eq!(platform.inbox(coach.id).unwrap()[0].notification.title, "Link ended");
}
