//! Pure step transitions for the sign-up wizard.
//!
//! Every function takes the draft by value and hands back the updated draft
//! together with the step that follows. Nothing here performs I/O.

use crate::domain::{
    error::ValidationError,
    models::{
        avatar::StorageRef,
        draft::{Coordinates, LocationGrant, RegistrationDraft},
        step::WizardStep,
    },
    validation::ValidationRules,
};

pub fn submit_basic_info(
    draft: RegistrationDraft,
    full_name: &str,
    email: &str,
    rules: &ValidationRules,
) -> Result<(RegistrationDraft, WizardStep), ValidationError> {
    rules.check_basic_info(full_name, email)?;
    let draft = draft.with_basic_info(full_name.to_string(), email.to_string());
    Ok((draft, WizardStep::Password))
}

pub fn submit_password(
    draft: RegistrationDraft,
    password: &str,
    confirm: &str,
    rules: &ValidationRules,
) -> Result<(RegistrationDraft, WizardStep), ValidationError> {
    rules.check_password(password, confirm)?;
    Ok((draft.with_password(password.to_string()), WizardStep::Location))
}

/// `None` covers skip, denial and missing capability alike.
pub fn apply_location(
    draft: RegistrationDraft,
    coordinates: Option<Coordinates>,
) -> (RegistrationDraft, WizardStep) {
    let grant = LocationGrant::from_coordinates(coordinates);
    (draft.with_location(grant), WizardStep::Avatar)
}

pub fn apply_avatar(
    draft: RegistrationDraft,
    avatar_ref: Option<StorageRef>,
) -> (RegistrationDraft, WizardStep) {
    (draft.with_avatar(avatar_ref), WizardStep::Submitting)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    #[rstest]
    fn basic_info_advances_to_password(rules: ValidationRules) {
        let (draft, step) =
            submit_basic_info(RegistrationDraft::new(), "Jane Doe", "jane@sewanee.edu", &rules)
                .unwrap();
        assert_eq!(step, WizardStep::Password);
        assert_eq!(draft.full_name(), "Jane Doe");
        assert_eq!(draft.email(), "jane@sewanee.edu");
        assert_eq!(draft.password(), "");
    }

    #[rstest]
    #[case("jane@gmail.com")]
    #[case("jane@sewanee.com")]
    #[case("JANE@SEWANEE.EDU")]
    fn foreign_domain_is_rejected(rules: ValidationRules, #[case] email: &str) {
        let result = submit_basic_info(RegistrationDraft::new(), "Jane Doe", email, &rules);
        assert!(matches!(result, Err(ValidationError::WrongDomain { .. })));
    }

    #[rstest]
    fn password_step_only_sets_password(rules: ValidationRules) {
        let (draft, _) =
            submit_basic_info(RegistrationDraft::new(), "Jane Doe", "jane@sewanee.edu", &rules)
                .unwrap();
        let (draft, step) = submit_password(draft, "Abcdefgh1", "Abcdefgh1", &rules).unwrap();
        assert_eq!(step, WizardStep::Location);
        assert_eq!(draft.password(), "Abcdefgh1");
        assert_eq!(draft.full_name(), "Jane Doe");
        assert!(!draft.location_enabled());
    }

    #[rstest]
    #[case("abc", "abc", ValidationError::TooShort)]
    #[case("Abcdefgh1", "Abcdefgh2", ValidationError::Mismatch)]
    #[case("abcdefgh1", "abcdefgh1", ValidationError::MissingUppercase)]
    fn password_failures(
        rules: ValidationRules,
        #[case] password: &str,
        #[case] confirm: &str,
        #[case] expected: ValidationError,
    ) {
        let result = submit_password(RegistrationDraft::new(), password, confirm, &rules);
        assert_eq!(result, Err(expected));
    }

    #[test]
    fn location_always_reaches_avatar() {
        let granted = Coordinates {
            latitude: 35.2043,
            longitude: -85.9211,
        };
        let (draft, step) = apply_location(RegistrationDraft::new(), Some(granted));
        assert_eq!(step, WizardStep::Avatar);
        assert_eq!(draft.location(), LocationGrant::Enabled(granted));

        let (draft, step) = apply_location(draft, None);
        assert_eq!(step, WizardStep::Avatar);
        assert_eq!(draft.location(), LocationGrant::Disabled);
    }

    #[test]
    fn avatar_always_reaches_submitting() {
        let (draft, step) = apply_avatar(RegistrationDraft::new(), None);
        assert_eq!(step, WizardStep::Submitting);
        assert!(draft.avatar_ref().is_none());

        let stored = StorageRef::new("user-avatars", "a.png");
        let (draft, _) = apply_avatar(draft, Some(stored.clone()));
        assert_eq!(draft.avatar_ref(), Some(&stored));
    }
}
