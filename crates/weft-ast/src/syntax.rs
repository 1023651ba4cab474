// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syntax node definitions.
//!
//! Every node variant is a plain struct generic over its child type `C`.
//! Inside the arena `C` is [`NodeId`]; in the upstream input document it is a
//! nested [`SyntaxTree`]. Children are always listed in field declaration
//! order, which is the order [`Syntax::children`] reports them in.

use serde::{Deserialize, Serialize};

use crate::ast::NodeId;

// ============================================================================
// Kinds
// ============================================================================

/// Discriminant of a [`Syntax`] node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
pub enum SyntaxKind {
    FunctionDecl,
    ParameterDecl,
    Block,
    VariableStmt,
    ExprStmt,
    ReturnStmt,
    ThrowStmt,
    IfStmt,
    WhileStmt,
    DoStmt,
    ForOfStmt,
    ForInStmt,
    TryStmt,
    CatchClause,
    BreakStmt,
    ContinueStmt,
    EmptyStmt,
    Identifier,
    ReferenceExpr,
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,
    NullLiteral,
    UndefinedLiteral,
    TemplateExpr,
    ArrayLiteral,
    ObjectLiteral,
    PropertyAssignment,
    ComputedPropertyName,
    SpreadAssignment,
    SpreadElement,
    PropertyAccess,
    ElementAccess,
    CallExpr,
    NewExpr,
    UnaryExpr,
    BinaryExpr,
    ConditionalExpr,
    ArrowFunction,
    AwaitExpr,
    SyntaxError,
}

/// Broad category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum NodeKind {
    Declaration,
    Expression,
    Statement,
    Error,
}

impl SyntaxKind {
    /// The category this kind belongs to.
    pub fn node_kind(self) -> NodeKind {
        match self {
            SyntaxKind::FunctionDecl | SyntaxKind::ParameterDecl => NodeKind::Declaration,
            SyntaxKind::Block
            | SyntaxKind::VariableStmt
            | SyntaxKind::ExprStmt
            | SyntaxKind::ReturnStmt
            | SyntaxKind::ThrowStmt
            | SyntaxKind::IfStmt
            | SyntaxKind::WhileStmt
            | SyntaxKind::DoStmt
            | SyntaxKind::ForOfStmt
            | SyntaxKind::ForInStmt
            | SyntaxKind::TryStmt
            | SyntaxKind::CatchClause
            | SyntaxKind::BreakStmt
            | SyntaxKind::ContinueStmt
            | SyntaxKind::EmptyStmt => NodeKind::Statement,
            SyntaxKind::SyntaxError => NodeKind::Error,
            _ => NodeKind::Expression,
        }
    }

    /// True for `while`, `do`, `for-of` and `for-in` loops.
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            SyntaxKind::WhileStmt
                | SyntaxKind::DoStmt
                | SyntaxKind::ForOfStmt
                | SyntaxKind::ForInStmt
        )
    }

    /// True for function declarations and inline functions.
    pub fn is_function(self) -> bool {
        matches!(self, SyntaxKind::FunctionDecl | SyntaxKind::ArrowFunction)
    }

    /// True for string, number, boolean, null and undefined literals.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            SyntaxKind::StringLiteral
                | SyntaxKind::NumberLiteral
                | SyntaxKind::BooleanLiteral
                | SyntaxKind::NullLiteral
                | SyntaxKind::UndefinedLiteral
        )
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Binary operators of the supported expression subset.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Add,
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Sub,
    #[serde(rename = "*")]
    #[strum(serialize = "*")]
    Mul,
    #[serde(rename = "/")]
    #[strum(serialize = "/")]
    Div,
    #[serde(rename = "%")]
    #[strum(serialize = "%")]
    Mod,
    #[serde(rename = "==")]
    #[strum(serialize = "==")]
    Eq,
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    NotEq,
    #[serde(rename = "===")]
    #[strum(serialize = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    #[strum(serialize = "!==")]
    StrictNotEq,
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    Lt,
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    LtEq,
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    Gt,
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    GtEq,
    #[serde(rename = "&&")]
    #[strum(serialize = "&&")]
    And,
    #[serde(rename = "||")]
    #[strum(serialize = "||")]
    Or,
    #[serde(rename = "??")]
    #[strum(serialize = "??")]
    Coalesce,
}

impl BinaryOp {
    /// Equality and ordering comparisons.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::StrictEq
                | BinaryOp::StrictNotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

/// Prefix unary operators.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Neg,
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Plus,
    #[serde(rename = "!")]
    #[strum(serialize = "!")]
    Not,
}

// ============================================================================
// Declarations
// ============================================================================

/// A named function, typically the root of a compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct FunctionDecl<C = NodeId> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<C>,
    pub body: C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDecl {
    pub name: String,
}

// ============================================================================
// Statements
// ============================================================================

/// An ordered sequence of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct Block<C = NodeId> {
    #[serde(default)]
    pub statements: Vec<C>,
    /// Set on the `finally` block of a try statement.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_finally: bool,
}

impl<C: Copy> Block<C> {
    pub fn first(&self) -> Option<C> {
        self.statements.first().copied()
    }

    pub fn last(&self) -> Option<C> {
        self.statements.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// `const name = initializer` / `let name;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct VariableStmt<C = NodeId> {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ExprStmt<C = NodeId> {
    pub expression: C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ReturnStmt<C = NodeId> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ThrowStmt<C = NodeId> {
    pub expression: C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct IfStmt<C = NodeId> {
    pub condition: C,
    pub then_stmt: C,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_stmt: Option<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct WhileStmt<C = NodeId> {
    pub condition: C,
    pub body: C,
}

/// `do { body } while (condition)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct DoStmt<C = NodeId> {
    pub body: C,
    pub condition: C,
}

/// `for (const variable of expression) body`
///
/// `variable` is a [`VariableStmt`] without initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ForOfStmt<C = NodeId> {
    pub variable: C,
    pub expression: C,
    pub body: C,
}

/// `for (const variable in expression) body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ForInStmt<C = NodeId> {
    pub variable: C,
    pub expression: C,
    pub body: C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct TryStmt<C = NodeId> {
    pub try_block: C,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_clause: Option<C>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finally_block: Option<C>,
}

/// `catch (variable) { block }`
///
/// `variable` is a [`VariableStmt`] without initializer binding the caught
/// error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct CatchClause<C = NodeId> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<C>,
    pub block: C,
}

// ============================================================================
// Expressions
// ============================================================================

/// A reference to a lexically bound name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub name: String,
}

/// A named handle to something outside the function body (a table, a
/// function, a state machine, a configuration value, or a utility object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceExpr {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringLiteral {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberLiteral {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanLiteral {
    pub value: bool,
}

/// `` `head${expr}literal...` ``
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct TemplateExpr<C = NodeId> {
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub spans: Vec<TemplateSpan<C>>,
}

/// One interpolated expression plus the literal text that follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct TemplateSpan<C = NodeId> {
    pub expression: C,
    #[serde(default)]
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ArrayLiteral<C = NodeId> {
    #[serde(default)]
    pub elements: Vec<C>,
}

/// `{ ...properties }` where each property is a [`PropertyAssignment`] or a
/// [`SpreadAssignment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ObjectLiteral<C = NodeId> {
    #[serde(default)]
    pub properties: Vec<C>,
}

/// `name: value`. `name` is an identifier, string or number literal, or a
/// computed property name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct PropertyAssignment<C = NodeId> {
    pub name: C,
    pub value: C,
}

/// `[expression]` in property-name position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ComputedPropertyName<C = NodeId> {
    pub expression: C,
}

/// `...expression` inside an object literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct SpreadAssignment<C = NodeId> {
    pub expression: C,
}

/// `...expression` inside an array literal or argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct SpreadElement<C = NodeId> {
    pub expression: C,
}

/// `expression.name` / `expression?.name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct PropertyAccess<C = NodeId> {
    pub expression: C,
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// `expression[element]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ElementAccess<C = NodeId> {
    pub expression: C,
    pub element: C,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct CallExpr<C = NodeId> {
    pub callee: C,
    #[serde(default)]
    pub arguments: Vec<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct NewExpr<C = NodeId> {
    pub callee: C,
    #[serde(default)]
    pub arguments: Vec<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct UnaryExpr<C = NodeId> {
    pub operator: UnaryOp,
    pub operand: C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct BinaryExpr<C = NodeId> {
    pub left: C,
    pub operator: BinaryOp,
    pub right: C,
}

/// `condition ? when_true : when_false`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ConditionalExpr<C = NodeId> {
    pub condition: C,
    pub when_true: C,
    pub when_false: C,
}

/// An inline anonymous function. `body` is always a [`Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct ArrowFunction<C = NodeId> {
    #[serde(default)]
    pub parameters: Vec<C>,
    pub body: C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "C: Deserialize<'de>"))]
pub struct AwaitExpr<C = NodeId> {
    pub expression: C,
}

/// Placeholder emitted upstream for source that failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxError {
    pub message: String,
}

// ============================================================================
// The closed node union
// ============================================================================

/// A syntax node, tagged by `"kind"` in its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Syntax<C = NodeId> {
    FunctionDecl(FunctionDecl<C>),
    ParameterDecl(ParameterDecl),
    Block(Block<C>),
    VariableStmt(VariableStmt<C>),
    ExprStmt(ExprStmt<C>),
    ReturnStmt(ReturnStmt<C>),
    ThrowStmt(ThrowStmt<C>),
    IfStmt(IfStmt<C>),
    WhileStmt(WhileStmt<C>),
    DoStmt(DoStmt<C>),
    ForOfStmt(ForOfStmt<C>),
    ForInStmt(ForInStmt<C>),
    TryStmt(TryStmt<C>),
    CatchClause(CatchClause<C>),
    BreakStmt,
    ContinueStmt,
    EmptyStmt,
    Identifier(Identifier),
    ReferenceExpr(ReferenceExpr),
    StringLiteral(StringLiteral),
    NumberLiteral(NumberLiteral),
    BooleanLiteral(BooleanLiteral),
    NullLiteral,
    UndefinedLiteral,
    TemplateExpr(TemplateExpr<C>),
    ArrayLiteral(ArrayLiteral<C>),
    ObjectLiteral(ObjectLiteral<C>),
    PropertyAssignment(PropertyAssignment<C>),
    ComputedPropertyName(ComputedPropertyName<C>),
    SpreadAssignment(SpreadAssignment<C>),
    SpreadElement(SpreadElement<C>),
    PropertyAccess(PropertyAccess<C>),
    ElementAccess(ElementAccess<C>),
    CallExpr(CallExpr<C>),
    NewExpr(NewExpr<C>),
    UnaryExpr(UnaryExpr<C>),
    BinaryExpr(BinaryExpr<C>),
    ConditionalExpr(ConditionalExpr<C>),
    ArrowFunction(ArrowFunction<C>),
    AwaitExpr(AwaitExpr<C>),
    SyntaxError(SyntaxError),
}

/// A node of the upstream input document: a [`Syntax`] whose children are
/// nested trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyntaxTree(pub Box<Syntax<SyntaxTree>>);

impl SyntaxTree {
    pub fn new(syntax: Syntax<SyntaxTree>) -> Self {
        SyntaxTree(Box::new(syntax))
    }
}

fn map_list<C, D, E>(
    items: &[C],
    f: &mut impl FnMut(&C) -> Result<D, E>,
) -> Result<Vec<D>, E> {
    items.iter().map(|c| f(c)).collect()
}

fn map_opt<C, D, E>(
    item: &Option<C>,
    f: &mut impl FnMut(&C) -> Result<D, E>,
) -> Result<Option<D>, E> {
    item.as_ref().map(|c| f(c)).transpose()
}

impl<C> Syntax<C> {
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Syntax::FunctionDecl(_) => SyntaxKind::FunctionDecl,
            Syntax::ParameterDecl(_) => SyntaxKind::ParameterDecl,
            Syntax::Block(_) => SyntaxKind::Block,
            Syntax::VariableStmt(_) => SyntaxKind::VariableStmt,
            Syntax::ExprStmt(_) => SyntaxKind::ExprStmt,
            Syntax::ReturnStmt(_) => SyntaxKind::ReturnStmt,
            Syntax::ThrowStmt(_) => SyntaxKind::ThrowStmt,
            Syntax::IfStmt(_) => SyntaxKind::IfStmt,
            Syntax::WhileStmt(_) => SyntaxKind::WhileStmt,
            Syntax::DoStmt(_) => SyntaxKind::DoStmt,
            Syntax::ForOfStmt(_) => SyntaxKind::ForOfStmt,
            Syntax::ForInStmt(_) => SyntaxKind::ForInStmt,
            Syntax::TryStmt(_) => SyntaxKind::TryStmt,
            Syntax::CatchClause(_) => SyntaxKind::CatchClause,
            Syntax::BreakStmt => SyntaxKind::BreakStmt,
            Syntax::ContinueStmt => SyntaxKind::ContinueStmt,
            Syntax::EmptyStmt => SyntaxKind::EmptyStmt,
            Syntax::Identifier(_) => SyntaxKind::Identifier,
            Syntax::ReferenceExpr(_) => SyntaxKind::ReferenceExpr,
            Syntax::StringLiteral(_) => SyntaxKind::StringLiteral,
            Syntax::NumberLiteral(_) => SyntaxKind::NumberLiteral,
            Syntax::BooleanLiteral(_) => SyntaxKind::BooleanLiteral,
            Syntax::NullLiteral => SyntaxKind::NullLiteral,
            Syntax::UndefinedLiteral => SyntaxKind::UndefinedLiteral,
            Syntax::TemplateExpr(_) => SyntaxKind::TemplateExpr,
            Syntax::ArrayLiteral(_) => SyntaxKind::ArrayLiteral,
            Syntax::ObjectLiteral(_) => SyntaxKind::ObjectLiteral,
            Syntax::PropertyAssignment(_) => SyntaxKind::PropertyAssignment,
            Syntax::ComputedPropertyName(_) => SyntaxKind::ComputedPropertyName,
            Syntax::SpreadAssignment(_) => SyntaxKind::SpreadAssignment,
            Syntax::SpreadElement(_) => SyntaxKind::SpreadElement,
            Syntax::PropertyAccess(_) => SyntaxKind::PropertyAccess,
            Syntax::ElementAccess(_) => SyntaxKind::ElementAccess,
            Syntax::CallExpr(_) => SyntaxKind::CallExpr,
            Syntax::NewExpr(_) => SyntaxKind::NewExpr,
            Syntax::UnaryExpr(_) => SyntaxKind::UnaryExpr,
            Syntax::BinaryExpr(_) => SyntaxKind::BinaryExpr,
            Syntax::ConditionalExpr(_) => SyntaxKind::ConditionalExpr,
            Syntax::ArrowFunction(_) => SyntaxKind::ArrowFunction,
            Syntax::AwaitExpr(_) => SyntaxKind::AwaitExpr,
            Syntax::SyntaxError(_) => SyntaxKind::SyntaxError,
        }
    }

    /// Immediate children in field declaration order.
    pub fn children(&self) -> Vec<&C> {
        let mut out = Vec::new();
        match self {
            Syntax::FunctionDecl(f) => {
                out.extend(f.parameters.iter());
                out.push(&f.body);
            }
            Syntax::Block(b) => out.extend(b.statements.iter()),
            Syntax::VariableStmt(v) => out.extend(v.initializer.iter()),
            Syntax::ExprStmt(s) => out.push(&s.expression),
            Syntax::ReturnStmt(s) => out.extend(s.expression.iter()),
            Syntax::ThrowStmt(s) => out.push(&s.expression),
            Syntax::IfStmt(s) => {
                out.push(&s.condition);
                out.push(&s.then_stmt);
                out.extend(s.else_stmt.iter());
            }
            Syntax::WhileStmt(s) => {
                out.push(&s.condition);
                out.push(&s.body);
            }
            Syntax::DoStmt(s) => {
                out.push(&s.body);
                out.push(&s.condition);
            }
            Syntax::ForOfStmt(s) => {
                out.push(&s.variable);
                out.push(&s.expression);
                out.push(&s.body);
            }
            Syntax::ForInStmt(s) => {
                out.push(&s.variable);
                out.push(&s.expression);
                out.push(&s.body);
            }
            Syntax::TryStmt(s) => {
                out.push(&s.try_block);
                out.extend(s.catch_clause.iter());
                out.extend(s.finally_block.iter());
            }
            Syntax::CatchClause(c) => {
                out.extend(c.variable.iter());
                out.push(&c.block);
            }
            Syntax::TemplateExpr(t) => out.extend(t.spans.iter().map(|s| &s.expression)),
            Syntax::ArrayLiteral(a) => out.extend(a.elements.iter()),
            Syntax::ObjectLiteral(o) => out.extend(o.properties.iter()),
            Syntax::PropertyAssignment(p) => {
                out.push(&p.name);
                out.push(&p.value);
            }
            Syntax::ComputedPropertyName(c) => out.push(&c.expression),
            Syntax::SpreadAssignment(s) => out.push(&s.expression),
            Syntax::SpreadElement(s) => out.push(&s.expression),
            Syntax::PropertyAccess(p) => out.push(&p.expression),
            Syntax::ElementAccess(e) => {
                out.push(&e.expression);
                out.push(&e.element);
            }
            Syntax::CallExpr(c) => {
                out.push(&c.callee);
                out.extend(c.arguments.iter());
            }
            Syntax::NewExpr(n) => {
                out.push(&n.callee);
                out.extend(n.arguments.iter());
            }
            Syntax::UnaryExpr(u) => out.push(&u.operand),
            Syntax::BinaryExpr(b) => {
                out.push(&b.left);
                out.push(&b.right);
            }
            Syntax::ConditionalExpr(c) => {
                out.push(&c.condition);
                out.push(&c.when_true);
                out.push(&c.when_false);
            }
            Syntax::ArrowFunction(f) => {
                out.extend(f.parameters.iter());
                out.push(&f.body);
            }
            Syntax::AwaitExpr(a) => out.push(&a.expression),
            Syntax::ParameterDecl(_)
            | Syntax::BreakStmt
            | Syntax::ContinueStmt
            | Syntax::EmptyStmt
            | Syntax::Identifier(_)
            | Syntax::ReferenceExpr(_)
            | Syntax::StringLiteral(_)
            | Syntax::NumberLiteral(_)
            | Syntax::BooleanLiteral(_)
            | Syntax::NullLiteral
            | Syntax::UndefinedLiteral
            | Syntax::SyntaxError(_) => {}
        }
        out
    }

    /// Rebuild this node with every child mapped through `f`.
    ///
    /// `f` is called in the same order as [`Syntax::children`].
    pub fn try_map<D, E>(&self, f: &mut impl FnMut(&C) -> Result<D, E>) -> Result<Syntax<D>, E> {
        Ok(match self {
            Syntax::FunctionDecl(x) => Syntax::FunctionDecl(FunctionDecl {
                name: x.name.clone(),
                parameters: map_list(&x.parameters, f)?,
                body: f(&x.body)?,
            }),
            Syntax::ParameterDecl(x) => Syntax::ParameterDecl(x.clone()),
            Syntax::Block(x) => Syntax::Block(Block {
                statements: map_list(&x.statements, f)?,
                is_finally: x.is_finally,
            }),
            Syntax::VariableStmt(x) => Syntax::VariableStmt(VariableStmt {
                name: x.name.clone(),
                initializer: map_opt(&x.initializer, f)?,
            }),
            Syntax::ExprStmt(x) => Syntax::ExprStmt(ExprStmt {
                expression: f(&x.expression)?,
            }),
            Syntax::ReturnStmt(x) => Syntax::ReturnStmt(ReturnStmt {
                expression: map_opt(&x.expression, f)?,
            }),
            Syntax::ThrowStmt(x) => Syntax::ThrowStmt(ThrowStmt {
                expression: f(&x.expression)?,
            }),
            Syntax::IfStmt(x) => Syntax::IfStmt(IfStmt {
                condition: f(&x.condition)?,
                then_stmt: f(&x.then_stmt)?,
                else_stmt: map_opt(&x.else_stmt, f)?,
            }),
            Syntax::WhileStmt(x) => Syntax::WhileStmt(WhileStmt {
                condition: f(&x.condition)?,
                body: f(&x.body)?,
            }),
            Syntax::DoStmt(x) => Syntax::DoStmt(DoStmt {
                body: f(&x.body)?,
                condition: f(&x.condition)?,
            }),
            Syntax::ForOfStmt(x) => Syntax::ForOfStmt(ForOfStmt {
                variable: f(&x.variable)?,
                expression: f(&x.expression)?,
                body: f(&x.body)?,
            }),
            Syntax::ForInStmt(x) => Syntax::ForInStmt(ForInStmt {
                variable: f(&x.variable)?,
                expression: f(&x.expression)?,
                body: f(&x.body)?,
            }),
            Syntax::TryStmt(x) => Syntax::TryStmt(TryStmt {
                try_block: f(&x.try_block)?,
                catch_clause: map_opt(&x.catch_clause, f)?,
                finally_block: map_opt(&x.finally_block, f)?,
            }),
            Syntax::CatchClause(x) => Syntax::CatchClause(CatchClause {
                variable: map_opt(&x.variable, f)?,
                block: f(&x.block)?,
            }),
            Syntax::BreakStmt => Syntax::BreakStmt,
            Syntax::ContinueStmt => Syntax::ContinueStmt,
            Syntax::EmptyStmt => Syntax::EmptyStmt,
            Syntax::Identifier(x) => Syntax::Identifier(x.clone()),
            Syntax::ReferenceExpr(x) => Syntax::ReferenceExpr(x.clone()),
            Syntax::StringLiteral(x) => Syntax::StringLiteral(x.clone()),
            Syntax::NumberLiteral(x) => Syntax::NumberLiteral(x.clone()),
            Syntax::BooleanLiteral(x) => Syntax::BooleanLiteral(x.clone()),
            Syntax::NullLiteral => Syntax::NullLiteral,
            Syntax::UndefinedLiteral => Syntax::UndefinedLiteral,
            Syntax::TemplateExpr(x) => Syntax::TemplateExpr(TemplateExpr {
                head: x.head.clone(),
                spans: x
                    .spans
                    .iter()
                    .map(|s| {
                        Ok(TemplateSpan {
                            expression: f(&s.expression)?,
                            literal: s.literal.clone(),
                        })
                    })
                    .collect::<Result<_, E>>()?,
            }),
            Syntax::ArrayLiteral(x) => Syntax::ArrayLiteral(ArrayLiteral {
                elements: map_list(&x.elements, f)?,
            }),
            Syntax::ObjectLiteral(x) => Syntax::ObjectLiteral(ObjectLiteral {
                properties: map_list(&x.properties, f)?,
            }),
            Syntax::PropertyAssignment(x) => Syntax::PropertyAssignment(PropertyAssignment {
                name: f(&x.name)?,
                value: f(&x.value)?,
            }),
            Syntax::ComputedPropertyName(x) => {
                Syntax::ComputedPropertyName(ComputedPropertyName {
                    expression: f(&x.expression)?,
                })
            }
            Syntax::SpreadAssignment(x) => Syntax::SpreadAssignment(SpreadAssignment {
                expression: f(&x.expression)?,
            }),
            Syntax::SpreadElement(x) => Syntax::SpreadElement(SpreadElement {
                expression: f(&x.expression)?,
            }),
            Syntax::PropertyAccess(x) => Syntax::PropertyAccess(PropertyAccess {
                expression: f(&x.expression)?,
                name: x.name.clone(),
                optional: x.optional,
            }),
            Syntax::ElementAccess(x) => Syntax::ElementAccess(ElementAccess {
                expression: f(&x.expression)?,
                element: f(&x.element)?,
                optional: x.optional,
            }),
            Syntax::CallExpr(x) => Syntax::CallExpr(CallExpr {
                callee: f(&x.callee)?,
                arguments: map_list(&x.arguments, f)?,
            }),
            Syntax::NewExpr(x) => Syntax::NewExpr(NewExpr {
                callee: f(&x.callee)?,
                arguments: map_list(&x.arguments, f)?,
            }),
            Syntax::UnaryExpr(x) => Syntax::UnaryExpr(UnaryExpr {
                operator: x.operator,
                operand: f(&x.operand)?,
            }),
            Syntax::BinaryExpr(x) => Syntax::BinaryExpr(BinaryExpr {
                left: f(&x.left)?,
                operator: x.operator,
                right: f(&x.right)?,
            }),
            Syntax::ConditionalExpr(x) => Syntax::ConditionalExpr(ConditionalExpr {
                condition: f(&x.condition)?,
                when_true: f(&x.when_true)?,
                when_false: f(&x.when_false)?,
            }),
            Syntax::ArrowFunction(x) => Syntax::ArrowFunction(ArrowFunction {
                parameters: map_list(&x.parameters, f)?,
                body: f(&x.body)?,
            }),
            Syntax::AwaitExpr(x) => Syntax::AwaitExpr(AwaitExpr {
                expression: f(&x.expression)?,
            }),
            Syntax::SyntaxError(x) => Syntax::SyntaxError(x.clone()),
        })
    }
}

// ============================================================================
// Typed narrowing
// ============================================================================

/// A node variant that [`Syntax`] can be narrowed to.
pub trait SyntaxVariant {
    const KIND: SyntaxKind;

    fn from_syntax(syntax: &Syntax) -> Option<&Self>;
}

macro_rules! syntax_variant {
    ($($ty:ident),* $(,)?) => {
        $(
            impl SyntaxVariant for $ty {
                const KIND: SyntaxKind = SyntaxKind::$ty;

                fn from_syntax(syntax: &Syntax) -> Option<&Self> {
                    match syntax {
                        Syntax::$ty(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

syntax_variant!(
    FunctionDecl,
    ParameterDecl,
    Block,
    VariableStmt,
    ExprStmt,
    ReturnStmt,
    ThrowStmt,
    IfStmt,
    WhileStmt,
    DoStmt,
    ForOfStmt,
    ForInStmt,
    TryStmt,
    CatchClause,
    Identifier,
    ReferenceExpr,
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,
    TemplateExpr,
    ArrayLiteral,
    ObjectLiteral,
    PropertyAssignment,
    ComputedPropertyName,
    SpreadAssignment,
    SpreadElement,
    PropertyAccess,
    ElementAccess,
    CallExpr,
    NewExpr,
    UnaryExpr,
    BinaryExpr,
    ConditionalExpr,
    ArrowFunction,
    AwaitExpr,
    SyntaxError,
);
