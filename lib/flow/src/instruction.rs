//! Flow instructions, decoded per handler at load time.
//!
//! On the wire an instruction is `{"handler": <tag>, "params": <any>}` where
//! the shape of `params` depends on the tag. Decoding never fails the whole
//! flow: an unrecognised tag becomes [`Instruction::Unknown`] and a known tag
//! with unusable params becomes [`Instruction::Invalid`]. Both are skipped
//! when the flow runs.

use chatflow_conversation::{FlowId, StepId, StepKind};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// One decoded instruction of a block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "JsonValue")]
pub enum Instruction {
    /// `show` with `type: text`: send a text message.
    ShowText { text: String },
    /// `show` with `type: buttons`: send a message offering reply options.
    ShowButtons { text: String, labels: Vec<String> },
    /// `goto`: move to a step and enter or evaluate it immediately.
    Goto { step: StepId, kind: StepKind },
    /// `action` named `change_status`: move the lead to another flow.
    ChangeStatus { flow: FlowId },
    /// `wait_answer`: resume at a step when the next reply arrives.
    WaitAnswer { step: StepId, kind: StepKind },
    /// `buttons`: reply options matched against an answer.
    Buttons { options: Vec<AnswerOption> },
    /// A handler this engine does not run.
    Unknown { handler: String },
    /// A known handler whose params could not be decoded.
    Invalid { handler: String, reason: String },
}

/// A reply option of a `buttons` answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerOption {
    /// Reply text that selects this option, matched exactly.
    #[serde(rename = "value")]
    pub label: String,
    /// Instructions run when the option is selected.
    #[serde(rename = "params", default)]
    pub instructions: Vec<Instruction>,
}

impl Instruction {
    /// Returns the wire handler tag, including the sub-kind for `show` and
    /// `action`.
    #[must_use]
    pub fn handler(&self) -> &str {
        match self {
            Self::ShowText { .. } => "show:text",
            Self::ShowButtons { .. } => "show:buttons",
            Self::Goto { .. } => "goto",
            Self::ChangeStatus { .. } => "action:change_status",
            Self::WaitAnswer { .. } => "wait_answer",
            Self::Buttons { .. } => "buttons",
            Self::Unknown { handler } | Self::Invalid { handler, .. } => handler,
        }
    }
}

#[derive(Deserialize)]
struct RawInstruction {
    handler: String,
    #[serde(default)]
    params: JsonValue,
}

#[derive(Deserialize)]
struct ShowParams {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    buttons: Vec<String>,
}

#[derive(Deserialize)]
struct StepParams {
    step: StepId,
    #[serde(rename = "type", default)]
    kind: StepKind,
}

#[derive(Deserialize)]
struct ActionParams {
    name: String,
    #[serde(default)]
    params: JsonValue,
}

#[derive(Deserialize)]
struct ChangeStatusParams {
    value: FlowId,
}

impl From<JsonValue> for Instruction {
    fn from(value: JsonValue) -> Self {
        match serde_json::from_value::<RawInstruction>(value) {
            Ok(raw) => decode(raw),
            Err(e) => Self::Invalid {
                handler: String::new(),
                reason: e.to_string(),
            },
        }
    }
}

fn decode(raw: RawInstruction) -> Instruction {
    let RawInstruction { handler, params } = raw;
    let decoded = match handler.as_str() {
        "show" => params_as::<ShowParams>(params).map(|show| match show.kind.as_str() {
            "text" => Instruction::ShowText { text: show.value },
            "buttons" => Instruction::ShowButtons {
                text: show.value,
                labels: show.buttons,
            },
            other => Instruction::Unknown {
                handler: format!("show:{other}"),
            },
        }),
        "goto" => params_as::<StepParams>(params).map(|target| Instruction::Goto {
            step: target.step,
            kind: target.kind,
        }),
        "wait_answer" => params_as::<StepParams>(params).map(|target| Instruction::WaitAnswer {
            step: target.step,
            kind: target.kind,
        }),
        "action" => params_as::<ActionParams>(params).and_then(|action| {
            match action.name.as_str() {
                "change_status" => params_as::<ChangeStatusParams>(action.params)
                    .map(|status| Instruction::ChangeStatus { flow: status.value }),
                other => Ok(Instruction::Unknown {
                    handler: format!("action:{other}"),
                }),
            }
        }),
        "buttons" => params_as::<Vec<AnswerOption>>(params)
            .map(|options| Instruction::Buttons { options }),
        _ => Ok(Instruction::Unknown {
            handler: handler.clone(),
        }),
    };

    decoded.unwrap_or_else(|e| Instruction::Invalid {
        handler,
        reason: e.to_string(),
    })
}

fn params_as<T: DeserializeOwned>(params: JsonValue) -> Result<T, serde_json::Error> {
    serde_json::from_value(params)
}
