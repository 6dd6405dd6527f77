//! Sign-up wizard orchestration.
//!
//! Drives the pure transitions in `domain::wizard` and calls out to the
//! registration, avatar and geolocation collaborators. One controller owns
//! exactly one draft.

use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, time::timeout};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::{
    error::{AuthError, PermissionError, UploadError, ValidationError},
    models::{
        avatar::StorageRef,
        draft::{Coordinates, LocationChoice, LocationGrant, RegistrationDraft},
        step::WizardStep,
        user::UserId,
    },
    services::{
        avatar_storage::AvatarStorage, geolocation_service::GeolocationProvider,
        registration_service::RegistrationService,
    },
    validation::ValidationRules,
    wizard,
};

pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("another step submission is still pending")]
    Busy,

    #[error("cannot submit {expected:?} while on {current:?}")]
    WrongStep {
        current: WizardStep,
        expected: WizardStep,
    },

    #[error("no step before {0:?}")]
    NoPreviousStep(WizardStep),

    #[error("result discarded after navigating away")]
    Superseded,
}

#[derive(Debug, Clone)]
pub struct WizardSettings {
    pub rules: ValidationRules,
    pub collaborator_timeout: Duration,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            rules: ValidationRules::default(),
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }
}

/// Read-only view of the wizard. Never exposes the password.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardSnapshot {
    pub step: WizardStep,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_set: bool,
    pub location: Option<LocationGrant>,
    pub avatar_ref: Option<StorageRef>,
    pub pending: bool,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarSubmission {
    pub step: WizardStep,
    pub avatar_ref: Option<StorageRef>,
    /// Set when the upload failed; the wizard moved on regardless.
    pub upload_error: Option<UploadError>,
}

#[derive(Debug)]
struct WizardSession {
    step: WizardStep,
    draft: Option<RegistrationDraft>,
    // bumped on every navigation so late collaborator results can be dropped
    generation: u64,
    user_id: Option<UserId>,
}

impl WizardSession {
    fn checkout(&self, expected: WizardStep) -> Result<RegistrationDraft, WizardError> {
        match &self.draft {
            Some(draft) if self.step == expected => Ok(draft.clone()),
            _ => Err(WizardError::WrongStep {
                current: self.step,
                expected,
            }),
        }
    }

    fn navigate(&mut self, step: WizardStep) {
        self.generation += 1;
        self.step = step;
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WizardController<R, S, G> {
    registration: R,
    storage: S,
    geolocation: G,
    settings: WizardSettings,
    session: Mutex<WizardSession>,
    in_flight: AtomicBool,
}

impl<R, S, G> WizardController<R, S, G>
where
    R: RegistrationService,
    S: AvatarStorage,
    G: GeolocationProvider,
{
    pub fn new(registration: R, storage: S, geolocation: G, settings: WizardSettings) -> Self {
        Self {
            registration,
            storage,
            geolocation,
            settings,
            session: Mutex::new(WizardSession {
                step: WizardStep::Login,
                draft: None,
                generation: 0,
                user_id: None,
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    pub async fn step(&self) -> WizardStep {
        self.session.lock().await.step
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let session = self.session.lock().await;
        let draft = session.draft.as_ref();
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        WizardSnapshot {
            step: session.step,
            full_name: draft.and_then(|d| non_empty(d.full_name())),
            email: draft.and_then(|d| non_empty(d.email())),
            password_set: draft.is_some_and(|d| !d.password().is_empty()),
            location: draft.map(|d| d.location()),
            avatar_ref: draft.and_then(|d| d.avatar_ref().cloned()),
            pending: self.in_flight.load(Ordering::Acquire),
            user_id: session.user_id,
        }
    }

    /// `Login -> BasicInfo` with a fresh draft.
    pub async fn begin(&self) -> Result<WizardStep, WizardError> {
        let mut session = self.session.lock().await;
        if session.step != WizardStep::Login {
            return Err(WizardError::WrongStep {
                current: session.step,
                expected: WizardStep::Login,
            });
        }
        session.navigate(WizardStep::BasicInfo);
        session.draft = Some(RegistrationDraft::new());
        session.user_id = None;
        info!(from = ?WizardStep::Login, to = ?WizardStep::BasicInfo, event = "begin", "wizard step transition");
        Ok(WizardStep::BasicInfo)
    }

    pub async fn submit_basic_info(
        &self,
        full_name: &str,
        email: &str,
    ) -> Result<WizardStep, WizardError> {
        let _in_flight = self.claim()?;
        let mut session = self.session.lock().await;
        let draft = session.checkout(WizardStep::BasicInfo)?;
        let (draft, next) =
            wizard::submit_basic_info(draft, full_name, email, &self.settings.rules)
                .inspect_err(|err| debug!(field = err.field(), "basic info rejected"))?;
        Ok(self.advance(&mut session, draft, next, "submit_basic_info"))
    }

    pub async fn submit_password(
        &self,
        password: &str,
        confirm: &str,
    ) -> Result<WizardStep, WizardError> {
        let _in_flight = self.claim()?;
        let mut session = self.session.lock().await;
        let draft = session.checkout(WizardStep::Password)?;
        let (draft, next) = wizard::submit_password(draft, password, confirm, &self.settings.rules)
            .inspect_err(|err| debug!(field = err.field(), "password rejected"))?;
        Ok(self.advance(&mut session, draft, next, "submit_password"))
    }

    /// Always lands on `Avatar`; a refused or missing location is not an error.
    pub async fn submit_location(&self, choice: LocationChoice) -> Result<WizardStep, WizardError> {
        let _in_flight = self.claim()?;
        let (draft, generation) = self.checkout(WizardStep::Location).await?;
        let coordinates = match choice {
            LocationChoice::Skip => None,
            LocationChoice::UseLocation => self.locate().await,
        };
        let (draft, next) = wizard::apply_location(draft, coordinates);
        self.commit(generation, draft, next, "submit_location").await
    }

    /// Always lands on `Submitting`; upload failures are reported, not raised.
    pub async fn submit_avatar(
        &self,
        image: Option<Vec<u8>>,
    ) -> Result<AvatarSubmission, WizardError> {
        let _in_flight = self.claim()?;
        let (draft, generation) = self.checkout(WizardStep::Avatar).await?;
        let (avatar_ref, upload_error) = match image {
            None => (None, None),
            Some(bytes) => match self.upload(bytes).await {
                Ok(stored) => (Some(stored), None),
                Err(err) => {
                    warn!(error = %err, "avatar upload failed, continuing without avatar");
                    (None, Some(err))
                }
            },
        };
        let (draft, next) = wizard::apply_avatar(draft, avatar_ref.clone());
        let step = self.commit(generation, draft, next, "submit_avatar").await?;
        Ok(AvatarSubmission {
            step,
            avatar_ref,
            upload_error,
        })
    }

    /// Submit the draft. Valid from `Submitting`, and from `Failed` as a retry.
    pub async fn finalize_registration(&self) -> Result<UserId, WizardError> {
        let _in_flight = self.claim()?;
        let (draft, generation) = {
            let mut session = self.session.lock().await;
            let retry = session.step == WizardStep::Failed;
            let checkout_step = if retry {
                WizardStep::Failed
            } else {
                WizardStep::Submitting
            };
            let draft = session.checkout(checkout_step).map_err(|_| WizardError::WrongStep {
                current: session.step,
                expected: WizardStep::Submitting,
            })?;
            if retry {
                info!(from = ?WizardStep::Failed, to = ?WizardStep::Submitting, event = "retry", "wizard step transition");
                session.step = WizardStep::Submitting;
            }
            (draft, session.generation)
        };

        let span = info_span!("usecase.wizard.finalize", email = %draft.email());
        let outcome = self
            .bounded(self.registration.submit_registration(&draft))
            .instrument(span)
            .await
            .unwrap_or(Err(AuthError::Timeout));

        let mut session = self.session.lock().await;
        if session.generation != generation {
            warn!(event = "finalize_registration", "discarding stale registration result");
            return Err(WizardError::Superseded);
        }
        match outcome {
            Ok(user_id) => {
                session.step = WizardStep::Done;
                session.draft = None;
                session.user_id = Some(user_id);
                info!(from = ?WizardStep::Submitting, to = ?WizardStep::Done, %user_id, "wizard step transition");
                Ok(user_id)
            }
            Err(err) => {
                session.step = WizardStep::Failed;
                warn!(from = ?WizardStep::Submitting, to = ?WizardStep::Failed, error = %err, "registration failed");
                Err(WizardError::Auth(err))
            }
        }
    }

    /// Step back. Leaving `BasicInfo` exits to `Login` and drops the draft.
    pub async fn go_back(&self) -> Result<WizardStep, WizardError> {
        let mut session = self.session.lock().await;
        let current = session.step;
        let previous = current
            .previous()
            .ok_or(WizardError::NoPreviousStep(current))?;
        session.navigate(previous);
        if current.discards_draft_on_back() {
            session.draft = None;
        }
        info!(from = ?current, to = ?previous, event = "go_back", "wizard step transition");
        Ok(previous)
    }

    /// Leave the wizard from anywhere, dropping the draft.
    pub async fn abandon(&self) -> WizardStep {
        let mut session = self.session.lock().await;
        let current = session.step;
        session.navigate(WizardStep::Login);
        session.draft = None;
        info!(from = ?current, to = ?WizardStep::Login, event = "abandon", "wizard step transition");
        WizardStep::Login
    }

    fn claim(&self) -> Result<InFlight<'_>, WizardError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WizardError::Busy)?;
        Ok(InFlight(&self.in_flight))
    }

    async fn checkout(&self, expected: WizardStep) -> Result<(RegistrationDraft, u64), WizardError> {
        let session = self.session.lock().await;
        let draft = session.checkout(expected)?;
        Ok((draft, session.generation))
    }

    async fn commit(
        &self,
        generation: u64,
        draft: RegistrationDraft,
        next: WizardStep,
        event: &'static str,
    ) -> Result<WizardStep, WizardError> {
        let mut session = self.session.lock().await;
        if session.generation != generation {
            warn!(event, "discarding stale step result");
            return Err(WizardError::Superseded);
        }
        Ok(self.advance(&mut session, draft, next, event))
    }

    fn advance(
        &self,
        session: &mut WizardSession,
        draft: RegistrationDraft,
        next: WizardStep,
        event: &'static str,
    ) -> WizardStep {
        let from = session.step;
        session.step = next;
        session.draft = Some(draft);
        info!(from = ?from, to = ?next, event, "wizard step transition");
        next
    }

    async fn locate(&self) -> Option<Coordinates> {
        let outcome = self
            .bounded(self.geolocation.request_geolocation())
            .await
            .unwrap_or(Err(PermissionError::Timeout));
        match outcome {
            Ok(coordinates) => Some(coordinates),
            Err(err) => {
                debug!(reason = %err, "location declined");
                None
            }
        }
    }

    async fn upload(&self, bytes: Vec<u8>) -> Result<StorageRef, UploadError> {
        self.bounded(self.storage.upload_avatar(bytes))
            .await
            .unwrap_or(Err(UploadError::Timeout))
    }

    /// `None` when the collaborator did not answer in time.
    async fn bounded<F: Future>(&self, call: F) -> Option<F::Output> {
        timeout(self.settings.collaborator_timeout, call).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use rstest::rstest;
    use tokio::sync::Notify;

    use super::*;

    const CAMPUS: Coordinates = Coordinates {
        latitude: 35.2043,
        longitude: -85.9211,
    };

    // mock collaborators

    #[derive(Clone, Default)]
    struct ScriptedRegistration {
        responses: Arc<StdMutex<VecDeque<Result<UserId, AuthError>>>>,
        submitted: Arc<StdMutex<Vec<RegistrationDraft>>>,
        entered: Arc<Notify>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedRegistration {
        fn replying(responses: Vec<Result<UserId, AuthError>>) -> Self {
            Self {
                responses: Arc::new(StdMutex::new(responses.into())),
                ..Self::default()
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn submitted(&self) -> Vec<RegistrationDraft> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RegistrationService for ScriptedRegistration {
        async fn submit_registration(
            &self,
            draft: &RegistrationDraft,
        ) -> Result<UserId, AuthError> {
            self.submitted.lock().unwrap().push(draft.clone());
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(UserId::new()))
        }
    }

    #[derive(Clone, Default)]
    struct MockStorage {
        failure: Option<UploadError>,
        uploads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AvatarStorage for MockStorage {
        async fn upload_avatar(&self, _image: Vec<u8>) -> Result<StorageRef, UploadError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(StorageRef::new("user-avatars", "avatar.png")),
            }
        }

        async fn signed_url(
            &self,
            avatar: &StorageRef,
            _ttl: Duration,
        ) -> Result<String, UploadError> {
            Ok(format!("https://cdn.test/{}", avatar))
        }

        async fn open_signed(&self, _path: &str, _token: &str) -> Result<Vec<u8>, UploadError> {
            Err(UploadError::NotFound)
        }
    }

    /// `None` never answers.
    #[derive(Clone)]
    struct MockGeolocation(Option<Result<Coordinates, PermissionError>>);

    #[async_trait]
    impl GeolocationProvider for MockGeolocation {
        async fn request_geolocation(&self) -> Result<Coordinates, PermissionError> {
            match &self.0 {
                Some(outcome) => outcome.clone(),
                None => std::future::pending().await,
            }
        }
    }

    type TestWizard = WizardController<ScriptedRegistration, MockStorage, MockGeolocation>;

    fn wizard_with(
        registration: ScriptedRegistration,
        storage: MockStorage,
        geolocation: MockGeolocation,
    ) -> TestWizard {
        let settings = WizardSettings {
            rules: ValidationRules::default(),
            collaborator_timeout: Duration::from_millis(50),
        };
        WizardController::new(registration, storage, geolocation, settings)
    }

    fn wizard() -> TestWizard {
        wizard_with(
            ScriptedRegistration::default(),
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        )
    }

    /// Walk forward from `Login` with valid input until `target`.
    async fn advance_to(controller: &TestWizard, target: WizardStep) {
        controller.begin().await.unwrap();
        if target == WizardStep::BasicInfo {
            return;
        }
        controller
            .submit_basic_info("Jane Doe", "jane@sewanee.edu")
            .await
            .unwrap();
        if target == WizardStep::Password {
            return;
        }
        controller
            .submit_password("Abcdefgh1", "Abcdefgh1")
            .await
            .unwrap();
        if target == WizardStep::Location {
            return;
        }
        controller
            .submit_location(LocationChoice::UseLocation)
            .await
            .unwrap();
        if target == WizardStep::Avatar {
            return;
        }
        controller.submit_avatar(Some(vec![1, 2, 3])).await.unwrap();
    }

    // basic info

    #[tokio::test]
    async fn test_basic_info_advances_to_password() {
        let controller = wizard();
        advance_to(&controller, WizardStep::BasicInfo).await;

        let step = controller
            .submit_basic_info("Jane Doe", "jane@sewanee.edu")
            .await
            .unwrap();

        assert_eq!(step, WizardStep::Password);
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(snapshot.email.as_deref(), Some("jane@sewanee.edu"));
    }

    #[rstest]
    #[case("jane@gmail.com")]
    #[case("jane@Sewanee.edu")]
    #[case("sewanee.edu")]
    #[tokio::test]
    async fn test_wrong_domain_leaves_draft_unchanged(#[case] email: &str) {
        let controller = wizard();
        advance_to(&controller, WizardStep::BasicInfo).await;
        let before = controller.snapshot().await;

        let result = controller.submit_basic_info("Jane Doe", email).await;

        assert!(matches!(
            result,
            Err(WizardError::Validation(ValidationError::WrongDomain { .. }))
        ));
        assert_eq!(controller.snapshot().await, before);
        assert_eq!(controller.step().await, WizardStep::BasicInfo);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let controller = wizard();
        advance_to(&controller, WizardStep::BasicInfo).await;

        let result = controller.submit_basic_info("  ", "jane@sewanee.edu").await;

        assert_eq!(
            result,
            Err(WizardError::Validation(ValidationError::EmptyName))
        );
    }

    // password

    #[rstest]
    #[case("abc", "abc", ValidationError::TooShort)]
    #[case("abcdefgh1", "abcdefgh1", ValidationError::MissingUppercase)]
    #[case("Abcdefgh1", "Abcdefgh", ValidationError::Mismatch)]
    #[tokio::test]
    async fn test_password_rejections_stay_on_password(
        #[case] password: &str,
        #[case] confirm: &str,
        #[case] expected: ValidationError,
    ) {
        let controller = wizard();
        advance_to(&controller, WizardStep::Password).await;

        let result = controller.submit_password(password, confirm).await;

        assert_eq!(result, Err(WizardError::Validation(expected)));
        assert_eq!(controller.step().await, WizardStep::Password);
        assert!(!controller.snapshot().await.password_set);
    }

    #[tokio::test]
    async fn test_matching_password_advances_to_location() {
        let controller = wizard();
        advance_to(&controller, WizardStep::Password).await;

        let step = controller
            .submit_password("Abcdefgh1", "Abcdefgh1")
            .await
            .unwrap();

        assert_eq!(step, WizardStep::Location);
        assert!(controller.snapshot().await.password_set);
    }

    #[tokio::test]
    async fn test_submitting_out_of_order_is_rejected() {
        let controller = wizard();
        advance_to(&controller, WizardStep::BasicInfo).await;

        let result = controller.submit_password("Abcdefgh1", "Abcdefgh1").await;

        assert_eq!(
            result,
            Err(WizardError::WrongStep {
                current: WizardStep::BasicInfo,
                expected: WizardStep::Password,
            })
        );
    }

    // location

    #[tokio::test]
    async fn test_granted_location_records_coordinates() {
        let controller = wizard();
        advance_to(&controller, WizardStep::Location).await;

        let step = controller
            .submit_location(LocationChoice::UseLocation)
            .await
            .unwrap();

        assert_eq!(step, WizardStep::Avatar);
        assert_eq!(
            controller.snapshot().await.location,
            Some(LocationGrant::Enabled(CAMPUS))
        );
    }

    #[rstest]
    #[case(MockGeolocation(Some(Err(PermissionError::Denied))), LocationChoice::UseLocation)]
    #[case(MockGeolocation(Some(Err(PermissionError::Unavailable))), LocationChoice::UseLocation)]
    #[case(MockGeolocation(None), LocationChoice::UseLocation)]
    #[case(MockGeolocation(Some(Ok(CAMPUS))), LocationChoice::Skip)]
    #[tokio::test]
    async fn test_declined_location_never_blocks(
        #[case] geolocation: MockGeolocation,
        #[case] choice: LocationChoice,
    ) {
        let controller = wizard_with(
            ScriptedRegistration::default(),
            MockStorage::default(),
            geolocation,
        );
        advance_to(&controller, WizardStep::Location).await;

        let step = controller.submit_location(choice).await.unwrap();

        assert_eq!(step, WizardStep::Avatar);
        assert_eq!(
            controller.snapshot().await.location,
            Some(LocationGrant::Disabled)
        );
    }

    // avatar

    #[tokio::test]
    async fn test_uploaded_avatar_is_recorded() {
        let controller = wizard();
        advance_to(&controller, WizardStep::Avatar).await;

        let submission = controller.submit_avatar(Some(vec![0xFF, 0xD8])).await.unwrap();

        assert_eq!(submission.step, WizardStep::Submitting);
        assert!(submission.upload_error.is_none());
        let stored = StorageRef::new("user-avatars", "avatar.png");
        assert_eq!(submission.avatar_ref, Some(stored.clone()));
        assert_eq!(controller.snapshot().await.avatar_ref, Some(stored));
    }

    #[tokio::test]
    async fn test_upload_failure_still_reaches_submitting() {
        let storage = MockStorage {
            failure: Some(UploadError::Io("bucket unavailable".to_string())),
            ..MockStorage::default()
        };
        let controller = wizard_with(
            ScriptedRegistration::default(),
            storage.clone(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Avatar).await;

        let submission = controller.submit_avatar(Some(vec![1])).await.unwrap();

        assert_eq!(submission.step, WizardStep::Submitting);
        assert_eq!(
            submission.upload_error,
            Some(UploadError::Io("bucket unavailable".to_string()))
        );
        assert_eq!(controller.snapshot().await.avatar_ref, None);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skipping_avatar_does_not_upload() {
        let storage = MockStorage::default();
        let controller = wizard_with(
            ScriptedRegistration::default(),
            storage.clone(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Avatar).await;

        let submission = controller.submit_avatar(None).await.unwrap();

        assert_eq!(submission.step, WizardStep::Submitting);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
    }

    // finalize

    #[tokio::test]
    async fn test_finalize_submits_complete_draft() {
        let registration = ScriptedRegistration::default();
        let controller = wizard_with(
            registration.clone(),
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Submitting).await;

        let user_id = controller.finalize_registration().await.unwrap();

        let submitted = registration.submitted();
        assert_eq!(submitted.len(), 1);
        let draft = &submitted[0];
        assert_eq!(draft.full_name(), "Jane Doe");
        assert_eq!(draft.email(), "jane@sewanee.edu");
        assert_eq!(draft.password(), "Abcdefgh1");
        assert!(draft.location_enabled());
        assert_eq!(draft.latitude(), Some(CAMPUS.latitude));
        assert!(draft.avatar_ref().is_some());

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.step, WizardStep::Done);
        assert_eq!(snapshot.user_id, Some(user_id));
        assert_eq!(snapshot.email, None);
    }

    #[tokio::test]
    async fn test_existing_user_fails_then_retry_reuses_draft() {
        let registration = ScriptedRegistration::replying(vec![
            Err(AuthError::UserAlreadyExists),
            Err(AuthError::UserAlreadyExists),
        ]);
        let controller = wizard_with(
            registration.clone(),
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Submitting).await;

        let err = controller.finalize_registration().await.unwrap_err();
        assert_eq!(err, WizardError::Auth(AuthError::UserAlreadyExists));
        assert_eq!(err.to_string(), "User already exists");
        assert_eq!(controller.step().await, WizardStep::Failed);
        assert_eq!(
            controller.snapshot().await.email.as_deref(),
            Some("jane@sewanee.edu")
        );

        let retry = controller.finalize_registration().await;
        assert_eq!(retry, Err(WizardError::Auth(AuthError::UserAlreadyExists)));

        let submitted = registration.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0], submitted[1]);
    }

    #[tokio::test]
    async fn test_retry_after_failure_completes() {
        let registration =
            ScriptedRegistration::replying(vec![Err(AuthError::Provider("offline".to_string()))]);
        let controller = wizard_with(
            registration.clone(),
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Submitting).await;

        assert!(controller.finalize_registration().await.is_err());
        let user_id = controller.finalize_registration().await.unwrap();

        assert_eq!(controller.step().await, WizardStep::Done);
        assert_eq!(controller.snapshot().await.user_id, Some(user_id));
        assert_eq!(registration.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_finalize_before_submitting_is_rejected() {
        let controller = wizard();
        advance_to(&controller, WizardStep::Avatar).await;

        let result = controller.finalize_registration().await;

        assert_eq!(
            result,
            Err(WizardError::WrongStep {
                current: WizardStep::Avatar,
                expected: WizardStep::Submitting,
            })
        );
    }

    // navigation

    #[tokio::test]
    async fn test_back_from_basic_info_discards_draft() {
        let controller = wizard();
        advance_to(&controller, WizardStep::Password).await;
        controller.go_back().await.unwrap();

        let step = controller.go_back().await.unwrap();

        assert_eq!(step, WizardStep::Login);
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.full_name, None);
        assert_eq!(snapshot.location, None);

        controller.begin().await.unwrap();
        assert_eq!(controller.snapshot().await.email, None);
    }

    #[rstest]
    #[case(WizardStep::Password, WizardStep::BasicInfo)]
    #[case(WizardStep::Location, WizardStep::Password)]
    #[case(WizardStep::Avatar, WizardStep::Location)]
    #[tokio::test]
    async fn test_back_then_forward_preserves_draft(
        #[case] from: WizardStep,
        #[case] to: WizardStep,
    ) {
        let controller = wizard();
        advance_to(&controller, from).await;
        let before = controller.snapshot().await;

        assert_eq!(controller.go_back().await.unwrap(), to);
        let kept = controller.snapshot().await;
        assert_eq!(kept.full_name, before.full_name);
        assert_eq!(kept.password_set, before.password_set);
        assert_eq!(kept.location, before.location);

        let step = match to {
            WizardStep::BasicInfo => controller.submit_basic_info("Jane Doe", "jane@sewanee.edu").await,
            WizardStep::Password => controller.submit_password("Abcdefgh1", "Abcdefgh1").await,
            _ => controller.submit_location(LocationChoice::UseLocation).await,
        }
        .unwrap();

        assert_eq!(step, from);
        assert_eq!(controller.snapshot().await, before);
    }

    #[rstest]
    #[case(WizardStep::Login)]
    #[case(WizardStep::Done)]
    #[tokio::test]
    async fn test_no_back_transition(#[case] at: WizardStep) {
        let controller = wizard();
        if at == WizardStep::Done {
            advance_to(&controller, WizardStep::Submitting).await;
            controller.finalize_registration().await.unwrap();
        }

        assert_eq!(
            controller.go_back().await,
            Err(WizardError::NoPreviousStep(at))
        );
    }

    #[tokio::test]
    async fn test_abandon_from_failed_drops_draft() {
        let registration = ScriptedRegistration::replying(vec![Err(AuthError::UserAlreadyExists)]);
        let controller = wizard_with(
            registration,
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Submitting).await;
        let _ = controller.finalize_registration().await;

        assert_eq!(controller.abandon().await, WizardStep::Login);
        assert_eq!(controller.snapshot().await.email, None);
        assert!(controller.finalize_registration().await.is_err());
    }

    // concurrency

    #[tokio::test]
    async fn test_second_submission_while_pending_is_busy() {
        let gate = Arc::new(Notify::new());
        let registration = ScriptedRegistration::gated(gate.clone());
        let controller = Arc::new(wizard_with(
            registration.clone(),
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        ));
        advance_to(&controller, WizardStep::Submitting).await;

        let pending = tokio::spawn({
            let controller = controller.clone();
            async move { controller.finalize_registration().await }
        });
        registration.entered.notified().await;

        assert!(controller.snapshot().await.pending);
        assert_eq!(
            controller.finalize_registration().await,
            Err(WizardError::Busy)
        );
        assert_eq!(
            controller.submit_avatar(None).await,
            Err(WizardError::Busy)
        );

        gate.notify_one();
        let user_id = pending.await.unwrap().unwrap();
        assert_eq!(controller.snapshot().await.user_id, Some(user_id));
        assert!(!controller.snapshot().await.pending);
    }

    #[tokio::test]
    async fn test_late_registration_after_back_is_discarded() {
        let gate = Arc::new(Notify::new());
        let registration = ScriptedRegistration::gated(gate.clone());
        let controller = Arc::new(wizard_with(
            registration.clone(),
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        ));
        advance_to(&controller, WizardStep::Submitting).await;

        let pending = tokio::spawn({
            let controller = controller.clone();
            async move { controller.finalize_registration().await }
        });
        registration.entered.notified().await;

        assert_eq!(controller.go_back().await, Ok(WizardStep::Avatar));
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), Err(WizardError::Superseded));
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.step, WizardStep::Avatar);
        assert_eq!(snapshot.user_id, None);
        assert_eq!(snapshot.email.as_deref(), Some("jane@sewanee.edu"));
    }

    #[tokio::test]
    async fn test_registration_timeout_fails_wizard() {
        // gate is never opened
        let registration = ScriptedRegistration::gated(Arc::new(Notify::new()));
        let controller = wizard_with(
            registration,
            MockStorage::default(),
            MockGeolocation(Some(Ok(CAMPUS))),
        );
        advance_to(&controller, WizardStep::Submitting).await;

        let result = controller.finalize_registration().await;

        assert_eq!(result, Err(WizardError::Auth(AuthError::Timeout)));
        assert_eq!(controller.step().await, WizardStep::Failed);
    }
}
