//! The constraint evaluator: computes visibility, active range, and effective
//! value per symbol from the current assignment, on demand.
//!
//! Computed fields are cached per symbol and invalidated through the model's
//! reverse adjacency lists when an assignment changes. The walk marks nodes in
//! a single pass with a visited set, so dependency cycles terminate; values
//! are recomputed lazily on the next read.

use {
    crate::{
        model::{ChoiceId, Model, NodeItem, SymbolId},
        parser::{Expr, ExprCmpOp, KconfigError, KconfigErrorKind, Kind, LocExpr},
        report::{Category, Report},
        value::Value,
    },
    log::trace,
    std::rc::Rc,
};

/// Where a user assignment came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Set on the command line.
    CommandLine,

    /// Read from the primary configuration file.
    PrimaryConfig,

    /// Read from a defaults overlay file.
    DefaultsFile,

    /// Reinstalled by a reset operation.
    Reset,
}

/// A user assignment for one symbol.
#[derive(Clone, Debug)]
pub struct UserValue {
    /// The assigned value.
    pub value: Value,

    /// Where the assignment came from.
    pub origin: Origin,

    /// Whether the stored record carried a `# default:` pragma.
    pub is_default: bool,
}

impl UserValue {
    /// Whether this assignment was an explicit user decision (priority 1)
    /// rather than a system-inferred default (priority 5).
    pub fn is_explicit(&self) -> bool {
        !self.is_default && matches!(self.origin, Origin::CommandLine | Origin::PrimaryConfig)
    }
}

/// Which rung of the priority ladder produced a symbol's effective value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueSource {
    /// An explicit user assignment.
    User,

    /// A `set` from a y-valued bool source.
    Set,

    /// Forced y by a `select`.
    Select,

    /// Raised to y by an `imply` that the direct dependencies permit.
    Imply,

    /// A default-marked user assignment (defaults file or `# default:`).
    DefaultUser,

    /// The first matching `default` clause.
    Default,

    /// Choice membership (selected or deselected).
    Choice,

    /// The kind's zero value.
    Zero,
}

#[derive(Debug, Default)]
struct SymState {
    user: Option<UserValue>,
    cached: Option<(Value, ValueSource)>,
    cached_vis: Option<bool>,
    cached_range: Option<Option<(Value, Value)>>,
    warned_undefined: bool,
    warned_select: bool,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct ChoiceState {
    user_selection: Option<SymbolId>,
    cached_selection: Option<Option<SymbolId>>,
    in_flight: bool,
}

/// The evaluator over one model. Single-threaded; all mutation passes through
/// `&mut self`.
#[derive(Debug)]
pub struct Engine {
    /// The symbol table and menu tree. Immutable after construction.
    pub model: Rc<Model>,

    /// Diagnostics collected during evaluation.
    pub report: Report,

    states: Vec<SymState>,
    choice_states: Vec<ChoiceState>,
}

impl Engine {
    /// Create an engine over a model.
    pub fn new(model: Model, report: Report) -> Self {
        let states = model.syms.iter().map(|_| SymState::default()).collect();
        let choice_states = model.choices.iter().map(|_| ChoiceState::default()).collect();

        Self {
            model: Rc::new(model),
            report,
            states,
            choice_states,
        }
    }

    /// Look up a symbol id by name.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.model.lookup(name)
    }

    /// The current user assignment of a symbol, if any.
    pub fn user_value(&self, id: SymbolId) -> Option<&UserValue> {
        self.states[id.0 as usize].user.as_ref()
    }

    /// Whether the symbol's current value is system-inferred rather than an
    /// explicit user decision.
    pub fn is_at_default(&mut self, id: SymbolId) -> bool {
        !matches!(self.value_source(id), ValueSource::User)
    }

    /// The effective value of a symbol.
    pub fn value(&mut self, id: SymbolId) -> Value {
        self.ensure_value(id).0
    }

    /// The rung of the priority ladder that produced the value.
    pub fn value_source(&mut self, id: SymbolId) -> ValueSource {
        self.ensure_value(id).1
    }

    fn ensure_value(&mut self, id: SymbolId) -> (Value, ValueSource) {
        if let Some(cached) = &self.states[id.0 as usize].cached {
            return cached.clone();
        }

        if self.states[id.0 as usize].in_flight {
            // A self-referential condition (`default A if A`). The recursive
            // occurrence reads as the kind's zero value, so the walk bottoms out.
            let kind = self.model.sym(id).kind;
            return (Value::zero(kind), ValueSource::Zero);
        }

        self.states[id.0 as usize].in_flight = true;
        let result = self.compute_value(id);
        self.states[id.0 as usize].in_flight = false;

        self.states[id.0 as usize].cached = Some(result.clone());
        result
    }

    fn compute_value(&mut self, id: SymbolId) -> (Value, ValueSource) {
        let model = self.model.clone();
        let sym = model.sym(id);
        trace!("compute_value: {}", sym.name);

        if !sym.defined && !self.states[id.0 as usize].warned_undefined {
            self.states[id.0 as usize].warned_undefined = true;
            self.report.warn(
                Category::UndefinedReference,
                None,
                format!("undefined symbol {} referenced; treating as n/\"\"", sym.name),
            );
        }

        let kind = sym.kind;
        let (value, source) = match kind {
            Kind::Bool => self.compute_bool(id),
            _ => self.compute_nonbool(id, kind),
        };

        (value, source)
    }

    fn compute_bool(&mut self, id: SymbolId) -> (Value, ValueSource) {
        let model = self.model.clone();
        let sym = model.sym(id);

        let mut candidate: Option<(bool, ValueSource)> = None;

        // 1. Explicit user assignment, respected while the prompt is visible.
        if self.visible(id) {
            if let Some(user) = &self.states[id.0 as usize].user {
                if user.is_explicit() {
                    candidate = Some((user.value.truth(), ValueSource::User));
                }
            }
        }

        // 2. `set` from a y-valued source, first match in declaration order.
        if candidate.is_none() {
            if let Some(value) = self.active_set_value(id, false) {
                candidate = Some((value.truth(), ValueSource::Set));
            }
        }

        // 5. Default-marked user assignment.
        if candidate.is_none() {
            if let Some(user) = self.states[id.0 as usize].user.clone() {
                if !user.is_explicit() {
                    candidate = Some((user.value.truth(), ValueSource::DefaultUser));
                }
            }
        }

        // 5, continued: `set default` loses to any stored user assignment.
        if candidate.is_none() {
            if let Some(value) = self.active_set_value(id, true) {
                candidate = Some((value.truth(), ValueSource::DefaultUser));
            }
        }

        // 6. The first default clause whose condition holds.
        if candidate.is_none() {
            if let Some(value) = self.active_default_value(id, Kind::Bool) {
                candidate = Some((value.truth(), ValueSource::Default));
            }
        }

        // 7. Choice membership.
        if candidate.is_none() {
            if let Some(cid) = sym.choice {
                let selected = self.choice_selection(cid) == Some(id);
                candidate = Some((selected, ValueSource::Choice));
            }
        }

        let (mut value, mut source) = candidate.unwrap_or((false, ValueSource::Zero));

        // Choice exclusion overrides everything below user intent: a selected
        // member is y, every other member is n.
        if let Some(cid) = sym.choice {
            let selected = self.choice_selection(cid) == Some(id);
            if selected != value {
                value = selected;
                source = ValueSource::Choice;
            }
            return (Value::Bool(value), source);
        }

        // 4. `imply` raises to y only when the direct dependencies permit.
        if !value && source != ValueSource::Set && self.imply_active(id) && self.direct_dep_truth(id) {
            value = true;
            source = ValueSource::Imply;
        }

        // 3. `select` forces y regardless of direct dependencies; an explicit
        // `set` is the only declaration that outranks it.
        if source != ValueSource::Set && self.select_active(id) {
            if !self.direct_dep_truth(id) && !self.states[id.0 as usize].warned_select {
                self.states[id.0 as usize].warned_select = true;
                self.report.warn(
                    Category::Misc,
                    sym.selected_by.first().map(|r| r.location),
                    format!(
                        "{} is selected to y although its direct dependencies evaluate to n",
                        sym.name_and_loc()
                    ),
                );
            }
            if !value {
                value = true;
                source = ValueSource::Select;
            }
        }

        (Value::Bool(value), source)
    }

    fn compute_nonbool(&mut self, id: SymbolId, kind: Kind) -> (Value, ValueSource) {
        let (mut value, source) = self.nonbool_candidate(id, kind);

        if kind.is_numeric() {
            if let Some((low, high)) = self.active_range(id) {
                let clamped = clamp(&value, &low, &high, kind);
                if clamped != value {
                    let name = self.model.sym(id).name.clone();
                    self.report.warn(
                        Category::RangeViolation,
                        None,
                        format!("value {value} of {name} is outside the active range [{low}, {high}]; clamped to {clamped}"),
                    );
                    value = clamped;
                }
            }
        }

        (value, source)
    }

    fn nonbool_candidate(&mut self, id: SymbolId, kind: Kind) -> (Value, ValueSource) {
        // 1. Explicit user assignment, respected while the prompt is visible.
        if self.visible(id) {
            if let Some(user) = self.states[id.0 as usize].user.clone() {
                if user.is_explicit() {
                    if let Some(value) = user.value.coerce(kind) {
                        return (value, ValueSource::User);
                    }
                }
            }
        }

        // 2. `set` from a y-valued source.
        if let Some(value) = self.active_set_value(id, false) {
            if let Some(value) = value.coerce(kind) {
                return (value, ValueSource::Set);
            }
        }

        // 5. Default-marked user assignment, then `set default`.
        if let Some(user) = self.states[id.0 as usize].user.clone() {
            if !user.is_explicit() {
                if let Some(value) = user.value.coerce(kind) {
                    return (value, ValueSource::DefaultUser);
                }
            }
        }

        if let Some(value) = self.active_set_value(id, true) {
            if let Some(value) = value.coerce(kind) {
                return (value, ValueSource::DefaultUser);
            }
        }

        // 6. The first default clause whose condition holds.
        if let Some(value) = self.active_default_value(id, kind) {
            return (value, ValueSource::Default);
        }

        // 8. The kind's zero value.
        (Value::zero(kind), ValueSource::Zero)
    }

    /// The value of the first active `set` (or `set default`) on this symbol:
    /// source evaluates y, condition holds, in declaration order.
    fn active_set_value(&mut self, id: SymbolId, defaults: bool) -> Option<Value> {
        let model = self.model.clone();
        let sym = model.sym(id);
        let sets = if defaults { &sym.set_default_by } else { &sym.set_by };

        for set in sets {
            if !self.value(set.source).truth() {
                continue;
            }
            if let Some(cond) = &set.condition {
                if !self.expr_truth(cond) {
                    continue;
                }
            }
            return Some(self.expr_value(&set.value));
        }

        None
    }

    /// The value of the first `default` clause whose condition holds, coerced
    /// to the symbol's kind. Defaults of the wrong type are skipped with a
    /// warning.
    fn active_default_value(&mut self, id: SymbolId, kind: Kind) -> Option<Value> {
        let model = self.model.clone();
        let sym = model.sym(id);

        for default in &sym.defaults {
            if let Some(cond) = &default.condition {
                if !self.expr_truth(cond) {
                    continue;
                }
            }

            let raw = self.expr_value(&default.value);

            match raw.coerce(kind) {
                Some(value) => return Some(value),
                None => {
                    self.report.warn(
                        Category::DefaultTypeMismatch,
                        Some(default.value.location),
                        format!("default {raw} of {} does not fit kind {kind}; ignored", sym.name),
                    );
                }
            }
        }

        None
    }

    fn select_active(&mut self, id: SymbolId) -> bool {
        let model = self.model.clone();
        for rev in &model.sym(id).selected_by {
            if !self.value(rev.source).truth() {
                continue;
            }
            match &rev.condition {
                Some(cond) if !self.expr_truth(cond) => continue,
                _ => return true,
            }
        }
        false
    }

    fn imply_active(&mut self, id: SymbolId) -> bool {
        let model = self.model.clone();
        for rev in &model.sym(id).implied_by {
            if !self.value(rev.source).truth() {
                continue;
            }
            match &rev.condition {
                Some(cond) if !self.expr_truth(cond) => continue,
                _ => return true,
            }
        }
        false
    }

    /// Whether the symbol's direct dependencies evaluate to y.
    pub fn direct_dep_truth(&mut self, id: SymbolId) -> bool {
        let model = self.model.clone();
        match &model.sym(id).direct_dep {
            Some(dep) => self.expr_truth(dep),
            None => true,
        }
    }

    /// Whether the symbol is visible: it has a prompt, the prompt condition
    /// holds, its direct dependencies hold, and no enclosing `visible if`
    /// hides it.
    pub fn visible(&mut self, id: SymbolId) -> bool {
        if let Some(vis) = self.states[id.0 as usize].cached_vis {
            return vis;
        }

        let model = self.model.clone();
        let sym = model.sym(id);

        let vis = match &sym.prompt {
            None => false,
            Some(prompt) => {
                let mut vis = match &prompt.condition {
                    Some(cond) => self.expr_truth(cond),
                    None => true,
                };
                vis = vis && self.direct_dep_truth(id);
                if let Some(visible_if) = &sym.visible_if {
                    vis = vis && self.expr_truth(visible_if);
                }
                vis
            }
        };

        self.states[id.0 as usize].cached_vis = Some(vis);
        vis
    }

    /// The active range of an int/hex/float symbol: the first range clause in
    /// declaration order whose condition holds.
    pub fn active_range(&mut self, id: SymbolId) -> Option<(Value, Value)> {
        if let Some(cached) = &self.states[id.0 as usize].cached_range {
            return cached.clone();
        }

        let model = self.model.clone();
        let sym = model.sym(id);
        let kind = sym.kind;

        let mut result = None;
        if kind.is_numeric() {
            for range in &sym.ranges {
                if let Some(cond) = &range.condition {
                    if !self.expr_truth(cond) {
                        continue;
                    }
                }

                let low = self.expr_value(&range.low).coerce(kind).unwrap_or_else(|| Value::zero(kind));
                let high = self.expr_value(&range.high).coerce(kind).unwrap_or_else(|| Value::zero(kind));
                result = Some((low, high));
                break;
            }
        }

        self.states[id.0 as usize].cached_range = Some(result.clone());
        result
    }

    /// The selected member of a choice, if any.
    pub fn choice_selection(&mut self, cid: ChoiceId) -> Option<SymbolId> {
        if let Some(cached) = self.choice_states[cid.0 as usize].cached_selection {
            return cached;
        }

        // A member condition can reach back into the choice; the recursive
        // read sees it deselected and the outer computation settles it.
        if self.choice_states[cid.0 as usize].in_flight {
            return None;
        }
        self.choice_states[cid.0 as usize].in_flight = true;

        let model = self.model.clone();
        let choice = model.choice(cid);

        let mut selection = None;

        let choice_visible = match &choice.direct_dep {
            Some(dep) => self.expr_truth(dep),
            None => true,
        };

        if choice_visible {
            if let Some(user) = self.choice_states[cid.0 as usize].user_selection {
                if self.visible(user) {
                    selection = Some(user);
                }
            }

            if selection.is_none() {
                // The first declaration-order default whose condition holds and
                // whose target is visible wins; with none, the choice stays
                // deselected.
                for default in &choice.defaults {
                    if let Some(cond) = &default.condition {
                        if !self.expr_truth(cond) {
                            continue;
                        }
                    }
                    if let Some(target) = model.lookup(&default.target) {
                        if choice.members.contains(&target) && self.visible(target) {
                            selection = Some(target);
                            break;
                        }
                    }
                }
            }

            if selection.is_none() && choice.defaults.is_empty() {
                // No defaults at all: fall back to the first visible member.
                for member in &choice.members {
                    if self.visible(*member) {
                        selection = Some(*member);
                        break;
                    }
                }
            }
        }

        self.choice_states[cid.0 as usize].in_flight = false;
        self.choice_states[cid.0 as usize].cached_selection = Some(selection);
        selection
    }

    /// Install a user assignment on a symbol and invalidate dependents.
    ///
    /// The value must fit the symbol's kind. Setting the active member of a
    /// choice to n is rejected, because no other member would become y.
    pub fn set_user(&mut self, id: SymbolId, value: Value, origin: Origin, is_default: bool) -> Result<(), KconfigError> {
        let model = self.model.clone();
        let sym = model.sym(id);

        let Some(value) = value.coerce(sym.kind) else {
            return Err(KconfigError::unlocated(KconfigErrorKind::TypeMismatch(format!(
                "the value {value} is invalid for {}, which has kind {}",
                sym.name_and_loc(),
                sym.kind
            ))));
        };

        if let Some(cid) = sym.choice {
            if value.truth() {
                self.choice_states[cid.0 as usize].user_selection = Some(id);
            } else if self.choice_selection(cid) == Some(id) {
                return Err(KconfigError::unlocated(KconfigErrorKind::Syntax(format!(
                    "cannot set {} to n: it is the active member of its choice and no other member would become y; \
                     set another member to y instead",
                    sym.name
                ))));
            }
        }

        self.states[id.0 as usize].user = Some(UserValue {
            value,
            origin,
            is_default,
        });
        self.invalidate_from_edit(id);

        Ok(())
    }

    /// Install an assignment read from a configuration file.
    ///
    /// Unlike [`Engine::set_user`], loading `# CONFIG_X is not set` for the
    /// currently selected choice member is not rejected: the record for the
    /// member that replaces it may only come later in the same file.
    pub fn load_user(&mut self, id: SymbolId, value: Value, origin: Origin, is_default: bool) -> Result<(), KconfigError> {
        let model = self.model.clone();
        let sym = model.sym(id);

        let Some(value) = value.coerce(sym.kind) else {
            return Err(KconfigError::unlocated(KconfigErrorKind::TypeMismatch(format!(
                "the value {value} is invalid for {}, which has kind {}",
                sym.name_and_loc(),
                sym.kind
            ))));
        };

        if let Some(cid) = sym.choice {
            if value.truth() {
                self.choice_states[cid.0 as usize].user_selection = Some(id);
            }
        }

        self.states[id.0 as usize].user = Some(UserValue {
            value,
            origin,
            is_default,
        });
        self.invalidate(id);

        Ok(())
    }

    /// Remove a symbol's user assignment, reverting it to its computed default.
    pub fn unset_user(&mut self, id: SymbolId) {
        self.states[id.0 as usize].user = None;

        if let Some(cid) = self.model.sym(id).choice {
            if self.choice_states[cid.0 as usize].user_selection == Some(id) {
                self.choice_states[cid.0 as usize].user_selection = None;
            }
        }

        self.invalidate(id);
    }

    /// Invalidate a symbol's computed fields and, transitively, those of its
    /// dependents. Cycles terminate via the visited set.
    pub fn invalidate(&mut self, id: SymbolId) {
        self.invalidate_inner(id, false);
    }

    /// Invalidation for an interactive edit. Default-marked assignments on
    /// dependent symbols are caches of values the system inferred under the
    /// old state; the edit makes them stale, so they are dropped and their
    /// symbols fall back to freshly computed defaults.
    fn invalidate_from_edit(&mut self, id: SymbolId) {
        self.invalidate_inner(id, true);
    }

    fn invalidate_inner(&mut self, id: SymbolId, drop_stale_defaults: bool) {
        let model = self.model.clone();
        let mut stack = vec![id];
        let mut seen = vec![false; self.states.len()];

        while let Some(s) = stack.pop() {
            if seen[s.0 as usize] {
                continue;
            }
            seen[s.0 as usize] = true;

            let state = &mut self.states[s.0 as usize];
            state.cached = None;
            state.cached_vis = None;
            state.cached_range = None;

            if drop_stale_defaults && s != id {
                if let Some(user) = &state.user {
                    if user.is_default && user.origin == Origin::PrimaryConfig {
                        state.user = None;
                    }
                }
            }

            if let Some(choices) = model.choice_dependents.get(&s) {
                for cid in choices {
                    self.choice_states[cid.0 as usize].cached_selection = None;
                }
            }

            // A member whose visibility or value may have changed can move
            // its choice's selection.
            if let Some(cid) = model.sym(s).choice {
                self.choice_states[cid.0 as usize].cached_selection = None;
            }

            for dep in &model.dependents[s.0 as usize] {
                stack.push(*dep);
            }
        }
    }

    /// Drop every cached field. A full re-evaluation follows on demand.
    pub fn invalidate_all(&mut self) {
        for state in &mut self.states {
            state.cached = None;
            state.cached_vis = None;
            state.cached_range = None;
        }
        for state in &mut self.choice_states {
            state.cached_selection = None;
        }
    }

    /// Evaluate an expression in a boolean context. Truth is two-valued.
    pub fn expr_truth(&mut self, expr: &LocExpr) -> bool {
        match &expr.expr {
            Expr::Symbol(name) => self.name_value(name).truth(),
            Expr::Integer(_) | Expr::Hex(_) | Expr::Float(_) | Expr::String(_) => false,
            Expr::Not(inner) => !self.expr_truth(inner),
            Expr::And(lhs, rhs) => self.expr_truth(lhs) && self.expr_truth(rhs),
            Expr::Or(lhs, rhs) => self.expr_truth(lhs) || self.expr_truth(rhs),
            Expr::Cmp(op, lhs, rhs) => self.cmp_truth(*op, lhs, rhs),
        }
    }

    /// Evaluate an expression to a typed value. Boolean operators yield a
    /// bool value.
    pub fn expr_value(&mut self, expr: &LocExpr) -> Value {
        match &expr.expr {
            Expr::Symbol(name) => self.name_value(name),
            Expr::Integer(i) => Value::Int(*i),
            Expr::Hex(h) => Value::Hex(*h),
            Expr::Float(x) => Value::Float(*x),
            Expr::String(s) => Value::Str(s.clone()),
            _ => Value::Bool(self.expr_truth(expr)),
        }
    }

    fn name_value(&mut self, name: &str) -> Value {
        match name {
            "y" => Value::Bool(true),
            "n" => Value::Bool(false),
            _ => match self.model.lookup(name) {
                Some(id) => self.value(id),
                // Names that are not symbol-shaped are string constants.
                None => Value::Str(name.to_string()),
            },
        }
    }

    fn cmp_truth(&mut self, op: ExprCmpOp, lhs: &LocExpr, rhs: &LocExpr) -> bool {
        let lv = self.expr_value(lhs);
        let rv = self.expr_value(rhs);

        // A string literal on either side pulls the comparison into string
        // space; so do string-valued symbols.
        let string_mode = matches!(lhs.expr, Expr::String(_))
            || matches!(rhs.expr, Expr::String(_))
            || matches!(lv, Value::Str(_))
            || matches!(rv, Value::Str(_));

        if string_mode {
            let (ls, rs) = (lv.to_string(), rv.to_string());
            match op {
                ExprCmpOp::Eq => ls == rs,
                ExprCmpOp::Ne => ls != rs,
                ExprCmpOp::Lt => ls < rs,
                ExprCmpOp::Le => ls <= rs,
                ExprCmpOp::Gt => ls > rs,
                ExprCmpOp::Ge => ls >= rs,
            }
        } else {
            let (ln, rn) = (lv.numeric(), rv.numeric());
            match op {
                ExprCmpOp::Eq => ln == rn,
                ExprCmpOp::Ne => ln != rn,
                ExprCmpOp::Lt => ln < rn,
                ExprCmpOp::Le => ln <= rn,
                ExprCmpOp::Gt => ln > rn,
                ExprCmpOp::Ge => ln >= rn,
            }
        }
    }

    /// The active warning message of a symbol, if its condition holds.
    pub fn active_warning(&mut self, id: SymbolId) -> Option<String> {
        let model = self.model.clone();
        let warning = model.sym(id).warning.as_ref()?;

        match &warning.condition {
            Some(cond) if !self.expr_truth(cond) => None,
            _ => Some(warning.message.to_string()),
        }
    }

    /// Whether a menu node is visible: a symbol/choice node follows its item,
    /// a menu is visible when its dependencies and `visible if` hold.
    pub fn node_visible(&mut self, node: &NodeItem) -> bool {
        match node {
            NodeItem::Symbol(id) => self.visible(*id),
            NodeItem::Choice(cid) => {
                let model = self.model.clone();
                let choice = model.choice(*cid);
                match &choice.direct_dep {
                    Some(dep) => self.expr_truth(dep),
                    None => true,
                }
            }
            NodeItem::Menu { dep, visible_if, .. } => {
                let dep = dep.clone();
                let visible_if = visible_if.clone();
                let mut vis = match &dep {
                    Some(dep) => self.expr_truth(dep),
                    None => true,
                };
                if let Some(cond) = &visible_if {
                    vis = vis && self.expr_truth(cond);
                }
                vis
            }
            NodeItem::Comment { dep, .. } => {
                let dep = dep.clone();
                match &dep {
                    Some(dep) => self.expr_truth(dep),
                    None => true,
                }
            }
        }
    }
}

/// Clamp `value` into `[low, high]` for the given numeric kind.
fn clamp(value: &Value, low: &Value, high: &Value, kind: Kind) -> Value {
    match kind {
        Kind::Int => {
            let (v, lo, hi) = (as_i64(value), as_i64(low), as_i64(high));
            Value::Int(v.clamp(lo.min(hi), hi.max(lo)))
        }
        Kind::Hex => {
            let (v, lo, hi) = (as_u64(value), as_u64(low), as_u64(high));
            Value::Hex(v.clamp(lo.min(hi), hi.max(lo)))
        }
        Kind::Float => {
            let (v, lo, hi) = (value.numeric(), low.numeric(), high.numeric());
            Value::Float(v.clamp(lo.min(hi), hi.max(lo)))
        }
        _ => value.clone(),
    }
}

fn as_i64(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        Value::Hex(h) => i64::try_from(*h).unwrap_or(i64::MAX),
        other => other.numeric() as i64,
    }
}

fn as_u64(value: &Value) -> u64 {
    match value {
        Value::Hex(h) => *h,
        Value::Int(i) => u64::try_from(*i).unwrap_or(0),
        other => other.numeric() as u64,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{Engine, Origin, ValueSource},
        crate::{
            model::Model,
            parser::{Kconfig, ParseContext, PeekableChars},
            report::{Category, Report},
            value::Value,
        },
        std::{collections::HashMap, path::Path},
    };

    pub(crate) fn engine(input: &str) -> Engine {
        let ctx = ParseContext::with_env(HashMap::new());
        let kconfig = Kconfig::from_str(PeekableChars::new(input, Path::new("test")), Path::new("/tmp"), &ctx).unwrap();
        let mut report = Report::new();
        let model = Model::build(&kconfig, &ctx, &mut report).unwrap();
        Engine::new(model, report)
    }

    fn set_y(engine: &mut Engine, name: &str) {
        let id = engine.lookup(name).unwrap();
        engine.set_user(id, Value::Bool(true), Origin::PrimaryConfig, false).unwrap();
    }

    #[test]
    fn defaults_and_dependencies() {
        let mut e = engine(
            r#"config A
    bool "A"
    default y

config B
    int "B"
    depends on A
    default 42 if A
    default 0
"#,
        );

        let a = e.lookup("A").unwrap();
        let b = e.lookup("B").unwrap();

        assert_eq!(e.value(a), Value::Bool(true));
        assert_eq!(e.value(b), Value::Int(42));
        assert!(e.visible(b));

        // User-set A to n: B's dependency fails and its second default applies.
        e.set_user(a, Value::Bool(false), Origin::PrimaryConfig, false).unwrap();
        assert_eq!(e.value(a), Value::Bool(false));
        assert_eq!(e.value(b), Value::Int(0));
        assert!(!e.visible(b));
        assert_eq!(e.value_source(b), ValueSource::Default);
    }

    #[test_log::test]
    fn select_bypasses_direct_deps_with_warning() {
        let mut e = engine(
            r#"config SRC
    bool
    default y
    select TGT

config TGT
    bool "T"
    depends on OTHER

config OTHER
    bool
    default n
"#,
        );

        let tgt = e.lookup("TGT").unwrap();
        assert_eq!(e.value(tgt), Value::Bool(true));
        assert_eq!(e.value_source(tgt), ValueSource::Select);
        assert!(!e.visible(tgt));

        let warned = e.report.diagnostics().iter().any(|d| d.message.contains("selected to y"));
        assert!(warned, "expected a select-bypass warning");
    }

    #[test]
    fn imply_respects_direct_deps() {
        let mut e = engine(
            r#"config SRC
    bool
    default y
    imply TGT

config TGT
    bool "T"
    depends on OTHER

config OTHER
    bool "other"
    default n
"#,
        );

        let tgt = e.lookup("TGT").unwrap();
        assert_eq!(e.value(tgt), Value::Bool(false));

        set_y(&mut e, "OTHER");
        assert_eq!(e.value(tgt), Value::Bool(true));
        assert_eq!(e.value_source(tgt), ValueSource::Imply);
    }

    #[test]
    fn set_overrides_defaults_and_direct_deps() {
        let mut e = engine(
            r#"config MODE
    bool
    default y
    set SPEED=115200

config SPEED
    int "speed"
    depends on NEVER
    default 9600
"#,
        );

        let speed = e.lookup("SPEED").unwrap();
        assert_eq!(e.value(speed), Value::Int(115200));
        assert_eq!(e.value_source(speed), ValueSource::Set);
    }

    #[test]
    fn set_default_loses_to_user() {
        let mut e = engine(
            r#"config MODE
    bool
    default y
    set default SPEED=115200

config SPEED
    int "speed"
    default 9600
"#,
        );

        let speed = e.lookup("SPEED").unwrap();
        assert_eq!(e.value(speed), Value::Int(115200));
        assert_eq!(e.value_source(speed), ValueSource::DefaultUser);

        e.set_user(speed, Value::Int(57600), Origin::PrimaryConfig, false).unwrap();
        assert_eq!(e.value(speed), Value::Int(57600));
        assert_eq!(e.value_source(speed), ValueSource::User);
    }

    #[test]
    fn range_clamps_with_warning() {
        let mut e = engine(
            r#"config N
    int "N"
    range 1 10
    default 99
"#,
        );

        let n = e.lookup("N").unwrap();
        assert_eq!(e.value(n), Value::Int(10));
        assert_eq!(e.report.by_category(Category::RangeViolation).count(), 1);
        assert_eq!(e.active_range(n), Some((Value::Int(1), Value::Int(10))));
    }

    #[test]
    fn conditional_range_first_match_wins() {
        let mut e = engine(
            r#"config WIDE
    bool "wide"
    default n

config N
    hex "N"
    range 0x0 0xFF if WIDE
    range 0x0 0xF
    default 0xAB
"#,
        );

        let n = e.lookup("N").unwrap();
        assert_eq!(e.value(n), Value::Hex(0xF));

        set_y(&mut e, "WIDE");
        assert_eq!(e.value(n), Value::Hex(0xAB));
    }

    #[test]
    fn choice_selects_first_defaulted_member() {
        let mut e = engine(
            r#"choice C
    prompt "c"
    default M2

    config M1
        bool "1"

    config M2
        bool "2"
endchoice
"#,
        );

        let m1 = e.lookup("M1").unwrap();
        let m2 = e.lookup("M2").unwrap();
        assert_eq!(e.value(m1), Value::Bool(false));
        assert_eq!(e.value(m2), Value::Bool(true));
    }

    #[test_log::test]
    fn choice_exclusion_on_user_set() {
        let mut e = engine(
            r#"choice C
    prompt "c"

    config M1
        bool "1"

    config M2
        bool "2"
endchoice
"#,
        );

        let m1 = e.lookup("M1").unwrap();
        let m2 = e.lookup("M2").unwrap();

        // No defaults: the first visible member is selected.
        assert_eq!(e.value(m1), Value::Bool(true));
        assert_eq!(e.value(m2), Value::Bool(false));

        set_y(&mut e, "M2");
        assert_eq!(e.value(m1), Value::Bool(false));
        assert_eq!(e.value(m2), Value::Bool(true));

        // Turning the active member off with no replacement is rejected.
        let err = e.set_user(m2, Value::Bool(false), Origin::PrimaryConfig, false);
        assert!(err.is_err());
    }

    #[test]
    fn choice_with_no_visible_member_is_deselected() {
        let mut e = engine(
            r#"config GATE
    bool "gate"
    default n

choice C
    prompt "c"

    config M1
        bool "1"
        depends on GATE

    config M2
        bool "2"
        depends on GATE
endchoice
"#,
        );

        let m1 = e.lookup("M1").unwrap();
        let m2 = e.lookup("M2").unwrap();
        assert_eq!(e.value(m1), Value::Bool(false));
        assert_eq!(e.value(m2), Value::Bool(false));

        set_y(&mut e, "GATE");
        assert_eq!(e.value(m1), Value::Bool(true));
        assert_eq!(e.value(m2), Value::Bool(false));
    }

    #[test]
    fn self_referential_default_terminates() {
        let mut e = engine(
            r#"config A
    bool "A"
    default y if A
"#,
        );

        let a = e.lookup("A").unwrap();
        // The recursive occurrence reads as n, so the default never fires.
        assert_eq!(e.value(a), Value::Bool(false));

        // A second evaluation pass is stable.
        assert_eq!(e.value(a), Value::Bool(false));
    }

    #[test]
    fn reevaluation_is_idempotent() {
        let mut e = engine(
            r#"config A
    bool "A"
    default y

config B
    int "B"
    depends on A
    default 7
"#,
        );

        let b = e.lookup("B").unwrap();
        let first = e.value(b);
        e.invalidate_all();
        let second = e.value(b);
        assert_eq!(first, second);
    }

    #[test]
    fn undefined_reference_warns_once() {
        let mut e = engine(
            r#"config A
    bool "A"
    default y if MISSING
"#,
        );

        let a = e.lookup("A").unwrap();
        assert_eq!(e.value(a), Value::Bool(false));
        e.invalidate_all();
        _ = e.value(a);
        assert_eq!(e.report.by_category(Category::UndefinedReference).count(), 1);
    }

    #[test]
    fn string_comparisons() {
        let mut e = engine(
            r#"config TARGET
    string "target"
    default "esp32"

config FLAG
    bool "flag"
    default y if TARGET = "esp32"

config OTHER
    bool "other"
    default y if TARGET = "esp48"
"#,
        );

        assert_eq!(e.value(e.lookup("FLAG").unwrap()), Value::Bool(true));
        assert_eq!(e.value(e.lookup("OTHER").unwrap()), Value::Bool(false));
    }

    #[test]
    fn numeric_comparisons_with_bool_encoding() {
        let mut e = engine(
            r#"config A
    bool "A"
    default y

config CMP
    bool "cmp"
    default y if A = 2

config LESS
    bool "less"
    default y if A < 3
"#,
        );

        // Legacy encoding: y compares as 2.
        assert_eq!(e.value(e.lookup("CMP").unwrap()), Value::Bool(true));
        assert_eq!(e.value(e.lookup("LESS").unwrap()), Value::Bool(true));
    }

    #[test]
    fn visible_if_hides_but_keeps_semantics() {
        let mut e = engine(
            r#"config SHOW
    bool "show"
    default n

menu "Hidden"
    visible if SHOW

config X
    bool "x"
    default y
endmenu
"#,
        );

        let x = e.lookup("X").unwrap();
        assert!(!e.visible(x));
        assert_eq!(e.value(x), Value::Bool(true));

        set_y(&mut e, "SHOW");
        assert!(e.visible(x));
    }

    #[test]
    fn float_kind_values_and_ranges() {
        let mut e = engine(
            r#"config RATIO
    float "ratio"
    range 0.0 1.0
    default 2.5
"#,
        );

        let ratio = e.lookup("RATIO").unwrap();
        assert_eq!(e.value(ratio), Value::Float(1.0));
    }

    #[test]
    fn unset_reverts_to_default() {
        let mut e = engine(
            r#"config A
    bool "A"
    default y
"#,
        );

        let a = e.lookup("A").unwrap();
        e.set_user(a, Value::Bool(false), Origin::PrimaryConfig, false).unwrap();
        assert_eq!(e.value(a), Value::Bool(false));

        e.unset_user(a);
        assert_eq!(e.value(a), Value::Bool(true));
        assert_eq!(e.value_source(a), ValueSource::Default);
    }
}
