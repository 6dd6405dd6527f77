use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Login,
    BasicInfo,
    Password,
    Location,
    Avatar,
    Submitting,
    Done,
    Failed,
}

impl WizardStep {
    /// Back-navigation target. `Login` and the terminal steps have none.
    pub fn previous(self) -> Option<WizardStep> {
        match self {
            WizardStep::BasicInfo => Some(WizardStep::Login),
            WizardStep::Password => Some(WizardStep::BasicInfo),
            WizardStep::Location => Some(WizardStep::Password),
            WizardStep::Avatar => Some(WizardStep::Location),
            WizardStep::Submitting => Some(WizardStep::Avatar),
            WizardStep::Login | WizardStep::Done | WizardStep::Failed => None,
        }
    }

    /// Leaving this step backwards exits the wizard and drops the draft.
    pub fn discards_draft_on_back(self) -> bool {
        matches!(self, WizardStep::BasicInfo)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(WizardStep::BasicInfo, Some(WizardStep::Login))]
    #[case(WizardStep::Password, Some(WizardStep::BasicInfo))]
    #[case(WizardStep::Location, Some(WizardStep::Password))]
    #[case(WizardStep::Avatar, Some(WizardStep::Location))]
    #[case(WizardStep::Submitting, Some(WizardStep::Avatar))]
    #[case(WizardStep::Login, None)]
    #[case(WizardStep::Done, None)]
    #[case(WizardStep::Failed, None)]
    fn previous_step(#[case] step: WizardStep, #[case] expected: Option<WizardStep>) {
        assert_eq!(step.previous(), expected);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&WizardStep::BasicInfo).unwrap();
        assert_eq!(json, "\"basic_info\"");
    }
}
