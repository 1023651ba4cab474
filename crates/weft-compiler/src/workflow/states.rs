// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State machine definitions, serialized as Amazon States Language.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// A (sub-)graph of named states.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachine {
    pub start_at: String,
    pub states: IndexMap<String, State>,
}

impl StateMachine {
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// The start state.
    pub fn start(&self) -> Option<&State> {
        self.states.get(&self.start_at)
    }
}

/// One node of a state machine, tagged by `"Type"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type")]
pub enum State {
    Pass(PassState),
    Task(TaskState),
    Choice(ChoiceState),
    Wait(WaitState),
    Map(MapState),
    Parallel(ParallelState),
    Succeed,
    Fail(FailState),
}

impl State {
    /// The state this one continues to, for states with a single successor.
    pub fn next(&self) -> Option<&str> {
        let transition = match self {
            State::Pass(s) => &s.transition,
            State::Task(s) => &s.transition,
            State::Wait(s) => &s.transition,
            State::Map(s) => &s.transition,
            State::Parallel(s) => &s.transition,
            State::Choice(_) | State::Succeed | State::Fail(_) => return None,
        };
        match transition {
            Transition::Next { next } => Some(next),
            Transition::End { .. } => None,
        }
    }
}

/// Successor wiring of a non-branching state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Transition {
    Next {
        #[serde(rename = "Next")]
        next: String,
    },
    End {
        #[serde(rename = "End")]
        end: bool,
    },
}

impl Transition {
    pub fn next(name: impl Into<String>) -> Self {
        Transition::Next { next: name.into() }
    }

    pub fn end() -> Self {
        Transition::End { end: true }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Transition::End { .. })
    }
}

impl From<Option<String>> for Transition {
    fn from(next: Option<String>) -> Self {
        match next {
            Some(next) => Transition::next(next),
            None => Transition::end(),
        }
    }
}

/// Where a state's result goes: a path, or nowhere (`null`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPath {
    Path(String),
    Discard,
}

impl Serialize for ResultPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResultPath::Path(path) => serializer.serialize_str(path),
            ResultPath::Discard => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PassState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(flatten)]
    pub transition: Transition,
}

impl PassState {
    pub fn new(transition: Transition) -> Self {
        Self {
            result: None,
            parameters: None,
            input_path: None,
            result_path: None,
            output_path: None,
            transition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<Catcher>,
    #[serde(flatten)]
    pub transition: Transition,
}

/// Error handler of a task, map, or parallel state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Catcher {
    pub error_equals: Vec<String>,
    pub next: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
}

impl Catcher {
    /// Catch every error.
    pub fn all(next: impl Into<String>, result_path: ResultPath) -> Self {
        Self {
            error_equals: vec!["States.ALL".to_string()],
            next: next.into(),
            result_path: Some(result_path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceState {
    pub choices: Vec<ChoiceRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceRule {
    #[serde(flatten)]
    pub condition: Condition,
    #[serde(rename = "Next")]
    pub next: String,
}

/// A choice rule condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    And {
        #[serde(rename = "And")]
        and: Vec<Condition>,
    },
    Or {
        #[serde(rename = "Or")]
        or: Vec<Condition>,
    },
    Not {
        #[serde(rename = "Not")]
        not: Box<Condition>,
    },
    Test {
        #[serde(rename = "Variable")]
        variable: String,
        #[serde(flatten)]
        test: Test,
    },
}

impl Condition {
    pub fn test(variable: impl Into<String>, test: Test) -> Self {
        Condition::Test {
            variable: variable.into(),
            test,
        }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And { and: conditions }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or { or: conditions }
    }

    pub fn negate(self) -> Self {
        match self {
            Condition::Not { not } => *not,
            other => Condition::Not {
                not: Box::new(other),
            },
        }
    }
}

/// Comparison operators of a choice rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Test {
    StringEquals(String),
    StringEqualsPath(String),
    StringLessThan(String),
    StringLessThanPath(String),
    StringLessThanEquals(String),
    StringLessThanEqualsPath(String),
    StringGreaterThan(String),
    StringGreaterThanPath(String),
    StringGreaterThanEquals(String),
    StringGreaterThanEqualsPath(String),
    NumericEquals(Number),
    NumericEqualsPath(String),
    NumericLessThan(Number),
    NumericLessThanPath(String),
    NumericLessThanEquals(Number),
    NumericLessThanEqualsPath(String),
    NumericGreaterThan(Number),
    NumericGreaterThanPath(String),
    NumericGreaterThanEquals(Number),
    NumericGreaterThanEqualsPath(String),
    BooleanEquals(bool),
    BooleanEqualsPath(String),
    IsNull(bool),
    IsPresent(bool),
    IsString(bool),
    IsNumeric(bool),
    IsBoolean(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_path: Option<String>,
    #[serde(flatten)]
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapState {
    pub items_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    pub iterator: StateMachine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<Catcher>,
    #[serde(flatten)]
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParallelState {
    pub branches: Vec<StateMachine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<Catcher>,
    #[serde(flatten)]
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FailState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pass_serializes_transition_inline() {
        let mut pass = PassState::new(Transition::next("Next state"));
        pass.result_path = Some(ResultPath::Discard);
        let value = serde_json::to_value(State::Pass(pass)).unwrap();
        assert_eq!(
            value,
            json!({ "Type": "Pass", "ResultPath": null, "Next": "Next state" })
        );

        let value = serde_json::to_value(State::Pass(PassState::new(Transition::end()))).unwrap();
        assert_eq!(value, json!({ "Type": "Pass", "End": true }));
    }

    #[test]
    fn test_choice_rule_flattens_condition() {
        let rule = ChoiceRule {
            condition: Condition::and(vec![
                Condition::test("$.x", Test::IsPresent(true)),
                Condition::test("$.x", Test::NumericGreaterThan(Number::from(2))).negate(),
            ]),
            next: "Done".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({
                "And": [
                    { "Variable": "$.x", "IsPresent": true },
                    { "Not": { "Variable": "$.x", "NumericGreaterThan": 2 } }
                ],
                "Next": "Done"
            })
        );
    }

    #[test]
    fn test_succeed_and_fail() {
        assert_eq!(serde_json::to_value(State::Succeed).unwrap(), json!({ "Type": "Succeed" }));
        let fail = FailState {
            error: Some("Error".into()),
            cause_path: Some("$.err.Cause".into()),
            ..FailState::default()
        };
        assert_eq!(
            serde_json::to_value(State::Fail(fail)).unwrap(),
            json!({ "Type": "Fail", "Error": "Error", "CausePath": "$.err.Cause" })
        );
    }
}
