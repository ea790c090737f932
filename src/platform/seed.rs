//! Demo data for local runs.
//!
//! Every step checks for existing records first, so seeding an already
//! seeded database changes nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoachError, CoachResult};
use crate::training::{Exercise, ExerciseType, MuscleGroup};
use crate::user::{ExpertiseArea, Registration, Role, UserId};

use super::Platform;

/// Password of every seeded account.
pub const DEMO_PASSWORD: &str = "123456";

const DEMO_DOMAIN: &str = "coachdesk.local";

/// What a seeding run created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    /// Catalog exercises added.
    pub exercises: usize,
    /// Accounts created.
    pub users: Vec<String>,
}

fn demo_exercises() -> Vec<Exercise> {
    vec![
        Exercise::new(
            "Barbell Bench Press",
            "Lie on a flat bench and grip the bar slightly wider than shoulder width. Lower it under control to the chest and press back up.",
            ExerciseType::FreeWeights,
            [MuscleGroup::Chest, MuscleGroup::Triceps, MuscleGroup::Shoulders],
        )
        .with_video("https://www.youtube.com/watch?v=rxD321l2svE"),
        Exercise::new(
            "Barbell Back Squat",
            "Rest the bar on the upper back, keep the chest up and the core braced, and sit down until the hips pass below the knees.",
            ExerciseType::FreeWeights,
            [MuscleGroup::Quadriceps, MuscleGroup::Glutes, MuscleGroup::Core, MuscleGroup::Legs],
        )
        .with_video("https://www.youtube.com/watch?v=vmN-9oCd_F8"),
        Exercise::new(
            "Lat Pulldown",
            "Sit at the high pulley with a wide grip. Pull the bar to the chest squeezing the back, then return slowly.",
            ExerciseType::MachineAssisted,
            [MuscleGroup::Lats, MuscleGroup::Back, MuscleGroup::Biceps],
        ),
        Exercise::new(
            "Dumbbell Curl",
            "Standing, palms up, flex the elbows bringing the dumbbells toward the shoulders without moving the elbows.",
            ExerciseType::FreeWeights,
            [MuscleGroup::Biceps, MuscleGroup::Forearm],
        ),
        Exercise::new(
            "Plank",
            "Rest on forearms and toes, keep the body straight with abs and glutes tight, and hold for the set time.",
            ExerciseType::BodyWeight,
            [MuscleGroup::Core],
        ),
    ]
}

fn date(year: i32, month: u32, day: u32) -> CoachResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| CoachError::internal(format!("invalid seed date {year}-{month}-{day}")))
}

impl Platform {
    /// Loads the demo data set: five catalog exercises, two
    /// administrators, an approved coach, nutritionist and psychologist,
    /// and a student with pending links to all three professionals.
    ///
    /// # Errors
    ///
    /// Propagates registration or storage failures.
    pub fn seed_demo_data(&self) -> CoachResult<SeedReport> {
        let mut report = SeedReport::default();

        for exercise in demo_exercises() {
            if self.stores.exercises.find_exercise_by_name(&exercise.name)?.is_none() {
                self.add_exercise(exercise)?;
                report.exercises += 1;
            }
        }

        for i in 1..=2u32 {
            let username = format!("admin{i}");
            if self.stores.users.find_by_username(&username)?.is_some() {
                continue;
            }
            let registration = Registration::builder()
                .username(&username)
                .password(DEMO_PASSWORD)
                .full_name(format!("Test Admin {i}"))
                .email(format!("{username}@{DEMO_DOMAIN}"))
                .date_of_birth(date(1995, 1, i)?)
                .role(Role::Administrator)
                .build()?;
            self.register_administrator(registration)?;
            report.users.push(username);
        }

        let professionals = [
            (Role::Coach, ExpertiseArea::Sports),
            (Role::Nutritionist, ExpertiseArea::ClinicalNutrition),
            (Role::Psychologist, ExpertiseArea::EducationalPsychology),
        ];
        let mut professional_ids: Vec<UserId> = Vec::with_capacity(professionals.len());
        for (index, (role, area)) in (1u32..).zip(professionals) {
            let username = format!("{}{index}", role.to_string().to_lowercase());
            if let Some(existing) = self.stores.users.find_by_username(&username)? {
                professional_ids.push(existing.id);
                continue;
            }
            let registration = Registration::builder()
                .username(&username)
                .password(DEMO_PASSWORD)
                .full_name(format!("Test Professional {index}"))
                .email(format!("{username}@{DEMO_DOMAIN}"))
                .date_of_birth(date(1988, index, 10)?)
                .role(role)
                .register(format!("REG{}", 1000 + index))
                .expertise(area)
                .build()?;
            let user = self.register(registration)?;
            self.approve_professional(user.id)?;
            professional_ids.push(user.id);
            report.users.push(username);
        }

        if self.stores.users.find_by_username("student")?.is_none() {
            let mut builder = Registration::builder()
                .username("student")
                .password(DEMO_PASSWORD)
                .full_name("Test Student")
                .email(format!("student@{DEMO_DOMAIN}"))
                .date_of_birth(date(2000, 5, 20)?)
                .role(Role::Student);
            for id in &professional_ids {
                builder = builder.link_with(*id);
            }
            self.register(builder.build()?)?;
            report.users.push("student".to_string());
        }

        tracing::info!(exercises = report.exercises, users = ?report.users, "demo data seeded");
        Ok(report)
    }
}
