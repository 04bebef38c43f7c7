//! Declarative capability policy.
//!
//! Maps `(role, action, ownership)` to an allow/deny decision. Handlers compute
//! the ownership of the resource they are about to touch and ask this table;
//! nothing here looks at HTTP or storage.

use serde::Serialize;

use learnhub_core::ProfileId;

use crate::Role;

/// Something a profile wants to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateBadge,
    CreateCourse,
    /// Update, delete, publish, and manage the content of a course
    /// (chapters, curriculum, attachments, quizzes).
    EditCourse,
    ManageTeams,
    AddTeamMember,
    RemoveTeamMember,
    AssignTeamCourse,
    UnassignTeamCourse,
    EnrollProfile,
    ManageProfiles,
    TrackProgress,
    TakeQuiz,
}

/// Relationship between the acting profile and the resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// The actor created / assigned / owns the resource.
    Owner,
    NotOwner,
    /// The action does not target an existing owned resource.
    NotApplicable,
}

impl Ownership {
    /// Ownership of a resource recorded as created by `owner`.
    pub fn of(actor: ProfileId, owner: Option<ProfileId>) -> Self {
        match owner {
            Some(owner) if owner == actor => Ownership::Owner,
            _ => Ownership::NotOwner,
        }
    }

    fn is_owner(self) -> bool {
        self == Ownership::Owner
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    fn from_bool(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }
}

/// Capability table.
///
/// - `HR_ADMIN` may do everything inside its company.
/// - `TRAINER` creates content and assignments, but only edits / removes what
///   it owns.
/// - `LEARNER` only acts on its own progress and quiz attempts.
pub fn decide(role: Role, action: Action, ownership: Ownership) -> Decision {
    use Action::*;

    let allowed = match role {
        Role::HrAdmin => true,
        Role::Trainer => match action {
            CreateBadge | CreateCourse | AddTeamMember | AssignTeamCourse | EnrollProfile | TakeQuiz => true,
            EditCourse | RemoveTeamMember | UnassignTeamCourse | TrackProgress => ownership.is_owner(),
            ManageTeams | ManageProfiles => false,
        },
        Role::Learner => match action {
            TakeQuiz => true,
            TrackProgress => ownership.is_owner(),
            _ => false,
        },
    };

    Decision::from_bool(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 12] = [
        Action::CreateBadge,
        Action::CreateCourse,
        Action::EditCourse,
        Action::ManageTeams,
        Action::AddTeamMember,
        Action::RemoveTeamMember,
        Action::AssignTeamCourse,
        Action::UnassignTeamCourse,
        Action::EnrollProfile,
        Action::ManageProfiles,
        Action::TrackProgress,
        Action::TakeQuiz,
    ];

    #[test]
    fn hr_admin_is_allowed_everything_regardless_of_ownership() {
        for action in ALL_ACTIONS {
            for ownership in [Ownership::Owner, Ownership::NotOwner, Ownership::NotApplicable] {
                assert!(decide(Role::HrAdmin, action, ownership).is_allowed(), "{action:?}");
            }
        }
    }

    #[test]
    fn trainer_edits_only_own_courses() {
        assert!(decide(Role::Trainer, Action::EditCourse, Ownership::Owner).is_allowed());
        assert!(!decide(Role::Trainer, Action::EditCourse, Ownership::NotOwner).is_allowed());
    }

    #[test]
    fn trainer_removes_only_what_it_assigned() {
        assert!(decide(Role::Trainer, Action::RemoveTeamMember, Ownership::Owner).is_allowed());
        assert!(!decide(Role::Trainer, Action::RemoveTeamMember, Ownership::NotOwner).is_allowed());
        assert!(decide(Role::Trainer, Action::UnassignTeamCourse, Ownership::Owner).is_allowed());
        assert!(!decide(Role::Trainer, Action::UnassignTeamCourse, Ownership::NotOwner).is_allowed());
    }

    #[test]
    fn trainer_cannot_manage_teams_or_profiles() {
        assert!(!decide(Role::Trainer, Action::ManageTeams, Ownership::NotApplicable).is_allowed());
        assert!(!decide(Role::Trainer, Action::ManageProfiles, Ownership::NotApplicable).is_allowed());
    }

    #[test]
    fn learner_only_takes_quizzes_and_tracks_own_progress() {
        for action in ALL_ACTIONS {
            let allowed = decide(Role::Learner, action, Ownership::Owner).is_allowed();
            let expected = matches!(action, Action::TakeQuiz | Action::TrackProgress);
            assert_eq!(allowed, expected, "{action:?}");
        }
        assert!(!decide(Role::Learner, Action::TrackProgress, Ownership::NotOwner).is_allowed());
    }

    #[test]
    fn ownership_of_compares_profiles() {
        let me = ProfileId::new();
        assert_eq!(Ownership::of(me, Some(me)), Ownership::Owner);
        assert_eq!(Ownership::of(me, Some(ProfileId::new())), Ownership::NotOwner);
        assert_eq!(Ownership::of(me, None), Ownership::NotOwner);
    }
}
