//! The symbol table and menu tree built from a parsed Kconfig hierarchy.
//!
//! Symbols, choices, and menu nodes live in flat arenas addressed by integer
//! ids; expressions keep referencing symbols by name and are resolved through
//! the table at evaluation time. The dependency graph between symbols may be
//! cyclic, which ids tolerate where ownership links would not.

use {
    crate::{
        parser::{
            Block, ChoiceDefault, Config as ConfigEntry, ConfigDefault, ConfigRange, ConfigWarning, Expr, Kconfig,
            KconfigError, KconfigErrorKind, Kind, LocExpr, Located, Location, ParseContext, Prompt,
        },
        report::{Category, Report},
    },
    std::collections::{HashMap, HashSet},
};

/// Identifier of a [`Symbol`] in the model.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SymbolId(pub u32);

/// Identifier of a [`Choice`] in the model.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChoiceId(pub u32);

/// Identifier of a [`MenuNode`] in the model.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub u32);

/// An incoming `select` or `imply`, stored on the target.
#[derive(Clone, Debug)]
pub struct ReverseDep {
    /// The bool symbol declaring the dependency.
    pub source: SymbolId,

    /// The condition guarding it; `None` is `y`.
    pub condition: Option<LocExpr>,

    /// Where the statement was declared.
    pub location: Location,
}

/// An incoming `set` or `set default`, stored on the target.
#[derive(Clone, Debug)]
pub struct SetDep {
    /// The bool symbol declaring the assignment.
    pub source: SymbolId,

    /// The value assigned to the target.
    pub value: LocExpr,

    /// The condition guarding it; `None` is `y`.
    pub condition: Option<LocExpr>,

    /// Where the statement was declared.
    pub location: Location,
}

/// A named configuration option.
#[derive(Debug, Default)]
pub struct Symbol {
    /// The symbol name.
    pub name: String,

    /// The declared kind.
    pub kind: Kind,

    /// Whether any `config` entry defines this symbol (as opposed to it only
    /// being referenced).
    pub defined: bool,

    /// The user-facing prompt, if any. Promptless symbols are not user-settable.
    pub prompt: Option<Prompt>,

    /// Help text.
    pub help: Option<String>,

    /// `default` clauses in declaration order.
    pub defaults: Vec<ConfigDefault>,

    /// `range` clauses in declaration order.
    pub ranges: Vec<ConfigRange>,

    /// Conjunction of all `depends on` clauses and enclosing `if`/menu deps.
    pub direct_dep: Option<LocExpr>,

    /// Conjunction of `visible if` conditions inherited from enclosing menus.
    /// Affects only prompt visibility, never the computed value.
    pub visible_if: Option<LocExpr>,

    /// Warning attached to the symbol.
    pub warning: Option<ConfigWarning>,

    /// Environment variable named by a deprecated `option env=` clause.
    pub env_var: Option<String>,

    /// The choice this symbol is a member of, if any.
    pub choice: Option<ChoiceId>,

    /// Incoming `select` statements.
    pub selected_by: Vec<ReverseDep>,

    /// Incoming `imply` statements.
    pub implied_by: Vec<ReverseDep>,

    /// Incoming `set` statements.
    pub set_by: Vec<SetDep>,

    /// Incoming `set default` statements.
    pub set_default_by: Vec<SetDep>,

    /// Every location defining this symbol.
    pub locations: Vec<Location>,

    /// Report areas suppressed by `# ignore:` pragmas.
    pub ignore: HashSet<String>,
}

impl Symbol {
    /// Whether the symbol carries a prompt and is therefore user-settable.
    pub fn has_prompt(&self) -> bool {
        self.prompt.is_some()
    }

    /// `NAME (defined at file:line)` for diagnostics.
    pub fn name_and_loc(&self) -> String {
        if self.locations.is_empty() {
            format!("{} (undefined)", self.name)
        } else {
            let locs: Vec<String> = self.locations.iter().map(|l| format!("{}:{}", l.filename.display(), l.line)).collect();
            format!("{} (defined at {})", self.name, locs.join(", "))
        }
    }
}

/// A mutually exclusive group of bool symbols.
#[derive(Debug, Default)]
pub struct Choice {
    /// The optional name of the choice.
    pub name: Option<String>,

    /// The user-facing prompt.
    pub prompt: Option<Prompt>,

    /// Help text.
    pub help: Option<String>,

    /// Members in declaration order.
    pub members: Vec<SymbolId>,

    /// `default` clauses in declaration order.
    pub defaults: Vec<ChoiceDefault>,

    /// Conjunction of `depends on` clauses and enclosing deps.
    pub direct_dep: Option<LocExpr>,

    /// Conjunction of inherited `visible if` conditions.
    pub visible_if: Option<LocExpr>,

    /// Every location defining this choice.
    pub locations: Vec<Location>,

    /// Report areas suppressed by `# ignore:` pragmas.
    pub ignore: HashSet<String>,
}

/// What a menu node wraps.
#[derive(Debug)]
pub enum NodeItem {
    /// A plain menu.
    Menu {
        /// The menu title.
        title: String,

        /// The menu's own dependencies.
        dep: Option<LocExpr>,

        /// `visible if` condition on the menu.
        visible_if: Option<LocExpr>,
    },

    /// A config or menuconfig entry.
    Symbol(SymbolId),

    /// A choice group.
    Choice(ChoiceId),

    /// A comment line shown in the menu.
    Comment {
        /// The comment text.
        text: String,

        /// The comment's dependencies.
        dep: Option<LocExpr>,
    },
}

/// A position in the menu tree.
#[derive(Debug)]
pub struct MenuNode {
    /// What this node wraps.
    pub item: NodeItem,

    /// The parent node; `None` for top-level nodes.
    pub parent: Option<NodeId>,

    /// Child nodes, in declaration order.
    pub children: Vec<NodeId>,
}

/// The complete symbol table and menu tree.
#[derive(Debug, Default)]
pub struct Model {
    /// All symbols, defined and referenced.
    pub syms: Vec<Symbol>,

    /// All choices.
    pub choices: Vec<Choice>,

    /// All menu nodes.
    pub nodes: Vec<MenuNode>,

    /// Top-level nodes in declaration order.
    pub top_nodes: Vec<NodeId>,

    /// Symbol name to id.
    pub by_name: HashMap<String, SymbolId>,

    /// Menu identifier (prompt-path slug) to menu node.
    pub menu_ids: HashMap<String, NodeId>,

    /// The main menu title.
    pub mainmenu: Option<String>,

    /// For each symbol, the symbols whose computed fields depend on it.
    pub dependents: Vec<Vec<SymbolId>>,

    /// For each symbol, the choices whose selection depends on it.
    pub choice_dependents: HashMap<SymbolId, Vec<ChoiceId>>,

    named_choices: HashMap<String, ChoiceId>,
    rev_sources: Vec<(SymbolId, Location)>,
}

impl Model {
    /// Build a model from a resolved Kconfig tree.
    ///
    /// Semantic problems that degrade gracefully go into `report`; problems
    /// that make the configuration unusable (a non-bool `select` source, for
    /// example) are returned as errors.
    pub fn build(kconfig: &Kconfig, ctx: &ParseContext, report: &mut Report) -> Result<Model, KconfigError> {
        let mut model = Model {
            mainmenu: kconfig.mainmenu.as_deref().map(str::to_string),
            ..Model::default()
        };

        model.add_blocks(&kconfig.blocks, None, None, None, None, ctx, report);
        model.finalize(report)?;

        Ok(model)
    }

    /// Look up a symbol id by name.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    /// The symbol with the given id.
    #[inline(always)]
    pub fn sym(&self, id: SymbolId) -> &Symbol {
        &self.syms[id.0 as usize]
    }

    #[inline(always)]
    fn sym_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.syms[id.0 as usize]
    }

    /// The choice with the given id.
    #[inline(always)]
    pub fn choice(&self, id: ChoiceId) -> &Choice {
        &self.choices[id.0 as usize]
    }

    /// The node with the given id.
    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &MenuNode {
        &self.nodes[id.0 as usize]
    }

    /// Iterate symbol ids in table order (which is declaration order for
    /// defined symbols).
    pub fn sym_ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.syms.len() as u32).map(SymbolId)
    }

    /// Iterate choice ids.
    pub fn choice_ids(&self) -> impl Iterator<Item = ChoiceId> {
        (0..self.choices.len() as u32).map(ChoiceId)
    }

    /// Walk the menu tree depth-first, in declaration order.
    pub fn walk_nodes(&self, mut visit: impl FnMut(NodeId)) {
        fn rec(model: &Model, id: NodeId, visit: &mut impl FnMut(NodeId)) {
            visit(id);
            for child in &model.node(id).children {
                rec(model, *child, visit);
            }
        }

        for id in &self.top_nodes {
            rec(self, *id, &mut visit);
        }
    }

    /// Intern a symbol name, creating an undefined symbol if it is new.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = SymbolId(self.syms.len() as u32);
        self.syms.push(Symbol {
            name: name.to_string(),
            ..Symbol::default()
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn add_node(&mut self, item: NodeItem, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(MenuNode {
            item,
            parent,
            children: Vec::new(),
        });

        match parent {
            Some(parent) => self.nodes[parent.0 as usize].children.push(id),
            None => self.top_nodes.push(id),
        }

        id
    }

    #[allow(clippy::too_many_arguments)]
    fn add_blocks(
        &mut self,
        blocks: &[Block],
        parent: Option<NodeId>,
        dep: Option<&LocExpr>,
        vis: Option<&LocExpr>,
        choice: Option<ChoiceId>,
        ctx: &ParseContext,
        report: &mut Report,
    ) {
        for block in blocks {
            match block {
                Block::Config(c) | Block::MenuConfig(c) => {
                    self.add_config(c, parent, dep, vis, choice, ctx, report);
                }

                Block::Menu(m) => {
                    let menu_dep = LocExpr::and_opt(dep.cloned(), conjoin(&m.depends_on));
                    let menu_vis = LocExpr::and_opt(vis.cloned(), m.visible_if.clone());

                    let node = self.add_node(
                        NodeItem::Menu {
                            title: m.title.to_string(),
                            dep: menu_dep.clone(),
                            visible_if: m.visible_if.clone(),
                        },
                        parent,
                    );

                    self.add_blocks(&m.blocks, Some(node), menu_dep.as_ref(), menu_vis.as_ref(), None, ctx, report);
                }

                Block::Choice(c) => {
                    let choice_dep = LocExpr::and_opt(dep.cloned(), conjoin(&c.depends_on));

                    let cid = match c.name.as_ref().and_then(|n| self.named_choices.get(&**n).copied()) {
                        Some(cid) => cid,
                        None => {
                            let cid = ChoiceId(self.choices.len() as u32);
                            self.choices.push(Choice::default());
                            if let Some(name) = &c.name {
                                self.named_choices.insert(name.to_string(), cid);
                            }
                            cid
                        }
                    };

                    {
                        let entry = &mut self.choices[cid.0 as usize];
                        entry.name = c.name.as_deref().map(str::to_string).or(entry.name.take());
                        if entry.prompt.is_none() {
                            entry.prompt = c.prompt.clone();
                        }
                        if entry.help.is_none() {
                            entry.help = c.help.as_deref().map(str::to_string);
                        }
                        entry.defaults.extend(c.defaults.iter().cloned());
                        entry.direct_dep = LocExpr::and_opt(entry.direct_dep.take(), choice_dep.clone());
                        entry.visible_if = LocExpr::and_opt(entry.visible_if.take(), vis.cloned());
                        entry.locations.push(c.location);
                        entry.ignore.extend(c.ignore.iter().cloned());

                        if entry.prompt.is_none() {
                            report.warn(
                                Category::Misc,
                                Some(c.location),
                                format!("<choice {}> defined without a prompt", c.name.as_deref().unwrap_or("")),
                            );
                        }
                    }

                    let node = self.add_node(NodeItem::Choice(cid), parent);

                    for member in &c.configs {
                        self.add_config(member, Some(node), choice_dep.as_ref(), vis, Some(cid), ctx, report);
                    }
                }

                Block::Comment(c) => {
                    let comment_dep = LocExpr::and_opt(dep.cloned(), conjoin(&c.depends_on));
                    self.add_node(
                        NodeItem::Comment {
                            text: c.text.to_string(),
                            dep: comment_dep,
                        },
                        parent,
                    );
                }

                // Source and if blocks were inlined during resolution;
                // mainmenu was hoisted off the block list.
                Block::If(_) | Block::Source(_) | Block::Mainmenu(_) => {
                    unreachable!("unresolved block reached the model builder: {block:?}")
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_config(
        &mut self,
        c: &ConfigEntry,
        parent: Option<NodeId>,
        dep: Option<&LocExpr>,
        vis: Option<&LocExpr>,
        choice: Option<ChoiceId>,
        ctx: &ParseContext,
        report: &mut Report,
    ) {
        let id = self.intern(&c.name);
        self.add_node(NodeItem::Symbol(id), parent);

        let entry_dep = LocExpr::and_opt(dep.cloned(), conjoin(&c.depends_on));

        let sym = self.sym_mut(id);
        sym.defined = true;
        sym.locations.push(c.location);
        sym.ignore.extend(c.ignore.iter().cloned());

        if sym.kind == Kind::Unknown {
            sym.kind = c.kind;
        } else if c.kind != Kind::Unknown && c.kind != sym.kind {
            let (have, got) = (sym.kind, c.kind);
            report.warn(
                Category::Misc,
                Some(c.location),
                format!("{} defined with two types, {have} and {got}; keeping {have}", c.name.to_string()),
            );
        }

        if choice.is_some() && sym.kind == Kind::Unknown {
            sym.kind = Kind::Bool;
        }

        match (&sym.prompt, &c.prompt) {
            (None, Some(_)) => sym.prompt = c.prompt.clone(),
            (Some(_), Some(_)) => {
                report.info(
                    Category::Misc,
                    Some(c.location),
                    format!("{} defined with multiple prompts; keeping the first", c.name.to_string()),
                );
            }
            _ => {}
        }

        if sym.help.is_none() {
            sym.help = c.help.as_deref().map(str::to_string);
        }

        sym.defaults.extend(c.defaults.iter().cloned());
        sym.ranges.extend(c.ranges.iter().cloned());
        sym.direct_dep = LocExpr::and_opt(sym.direct_dep.take(), entry_dep);
        sym.visible_if = LocExpr::and_opt(sym.visible_if.take(), vis.cloned());

        if sym.warning.is_none() {
            sym.warning = c.warning.clone();
        }

        if let Some(env_name) = &c.env {
            sym.env_var = Some(env_name.to_string());
            match ctx.expand(env_name) {
                Some(value) => {
                    let default = ConfigDefault {
                        value: LocExpr::new(Expr::String(value), env_name.location()),
                        condition: None,
                    };
                    self.sym_mut(id).defaults.push(default);
                }
                None => report.warn(
                    Category::Misc,
                    Some(env_name.location()),
                    format!(
                        "{} has 'option env=\"{}\"', but the environment variable is not set",
                        c.name.to_string(),
                        env_name.to_string()
                    ),
                ),
            }
        }

        if let Some(cid) = choice {
            self.sym_mut(id).choice = Some(cid);
            if !self.choices[cid.0 as usize].members.contains(&id) {
                self.choices[cid.0 as usize].members.push(id);
            }
        }

        let has_rev_deps = !c.selects.is_empty() || !c.implies.is_empty() || !c.sets.is_empty() || !c.set_defaults.is_empty();
        if has_rev_deps {
            self.rev_sources.push((id, c.location));
        }

        for select in &c.selects {
            let target = self.intern(&select.target);
            self.sym_mut(target).selected_by.push(ReverseDep {
                source: id,
                condition: select.condition.clone(),
                location: select.target.location(),
            });
        }

        for imply in &c.implies {
            let target = self.intern(&imply.target);
            self.sym_mut(target).implied_by.push(ReverseDep {
                source: id,
                condition: imply.condition.clone(),
                location: imply.target.location(),
            });
        }

        for set in &c.sets {
            let target = self.intern(&set.target);
            self.sym_mut(target).set_by.push(SetDep {
                source: id,
                value: set.value.clone(),
                condition: set.condition.clone(),
                location: set.target.location(),
            });
        }

        for set in &c.set_defaults {
            let target = self.intern(&set.target);
            self.sym_mut(target).set_default_by.push(SetDep {
                source: id,
                value: set.value.clone(),
                condition: set.condition.clone(),
                location: set.target.location(),
            });
        }
    }

    fn finalize(&mut self, report: &mut Report) -> Result<(), KconfigError> {
        // Multiple definitions merge; they are reported unless every definition
        // site carries the ignore pragma.
        for sym in &self.syms {
            if sym.locations.len() > 1
                && !Category::MultipleDefinition.ignore_codes().iter().any(|code| sym.ignore.contains(*code))
            {
                report.notify(
                    Category::MultipleDefinition,
                    Some(sym.locations[0]),
                    format!("{} defined multiple times", sym.name_and_loc()),
                );
            }
        }

        // Reverse dependencies may only originate from bool symbols.
        for (source, location) in std::mem::take(&mut self.rev_sources) {
            let sym = self.sym(source);
            if sym.kind != Kind::Bool {
                return Err(KconfigError::new(
                    KconfigErrorKind::NonBoolReverseDep(format!(
                        "{} is {}, but select/imply/set require a bool source",
                        sym.name_and_loc(),
                        sym.kind
                    )),
                    location,
                ));
            }
        }

        // select/imply targets must be bool as well; undefined targets are
        // merely useless.
        for id in 0..self.syms.len() as u32 {
            let sym = &self.syms[id as usize];
            let has_bool_revdeps = !sym.selected_by.is_empty() || !sym.implied_by.is_empty();
            let has_set_revdeps = !sym.set_by.is_empty() || !sym.set_default_by.is_empty();

            if !has_bool_revdeps && !has_set_revdeps {
                continue;
            }

            if !sym.defined {
                let location = sym
                    .selected_by
                    .first()
                    .map(|r| r.location)
                    .or_else(|| sym.implied_by.first().map(|r| r.location))
                    .or_else(|| sym.set_by.first().map(|r| r.location))
                    .or_else(|| sym.set_default_by.first().map(|r| r.location));
                report.notify(
                    Category::UnusedReverseDep,
                    location,
                    format!("reverse dependency on {}, which is never defined", sym.name),
                );
                continue;
            }

            if has_bool_revdeps && sym.kind != Kind::Bool {
                let location = sym.selected_by.first().or(sym.implied_by.first()).map(|r| r.location);
                return Err(KconfigError {
                    kind: KconfigErrorKind::NonBoolReverseDep(format!(
                        "{} is {}, but it is the target of a select or imply",
                        sym.name_and_loc(),
                        sym.kind
                    )),
                    backtrace: std::backtrace::Backtrace::capture(),
                    location,
                });
            }
        }

        self.build_dependents();
        self.build_menu_ids();

        Ok(())
    }

    /// Populate the reverse adjacency lists used for incremental invalidation.
    fn build_dependents(&mut self) {
        // Intern every name referenced anywhere first, so ids are stable.
        let mut edges: Vec<(String, SymbolId)> = Vec::new();
        let mut i = 0;
        while i < self.syms.len() {
            let id = SymbolId(i as u32);
            let mut names: Vec<String> = Vec::new();
            {
                let sym = &self.syms[i];

                for e in [&sym.direct_dep, &sym.visible_if] {
                    if let Some(e) = e {
                        e.visit_symbols(&mut |n| push_name(&mut names, n));
                    }
                }
                if let Some(cond) = sym.prompt.as_ref().and_then(|p| p.condition.as_ref()) {
                    cond.visit_symbols(&mut |n| push_name(&mut names, n));
                }
                if let Some(cond) = sym.warning.as_ref().and_then(|w| w.condition.as_ref()) {
                    cond.visit_symbols(&mut |n| push_name(&mut names, n));
                }
                for default in &sym.defaults {
                    default.value.visit_symbols(&mut |n| push_name(&mut names, n));
                    if let Some(cond) = &default.condition {
                        cond.visit_symbols(&mut |n| push_name(&mut names, n));
                    }
                }
                for range in &sym.ranges {
                    range.low.visit_symbols(&mut |n| push_name(&mut names, n));
                    range.high.visit_symbols(&mut |n| push_name(&mut names, n));
                    if let Some(cond) = &range.condition {
                        cond.visit_symbols(&mut |n| push_name(&mut names, n));
                    }
                }
                for rev in sym.selected_by.iter().chain(&sym.implied_by) {
                    names.push(self.syms[rev.source.0 as usize].name.clone());
                    if let Some(cond) = &rev.condition {
                        cond.visit_symbols(&mut |n| push_name(&mut names, n));
                    }
                }
                for set in sym.set_by.iter().chain(&sym.set_default_by) {
                    names.push(self.syms[set.source.0 as usize].name.clone());
                    set.value.visit_symbols(&mut |n| push_name(&mut names, n));
                    if let Some(cond) = &set.condition {
                        cond.visit_symbols(&mut |n| push_name(&mut names, n));
                    }
                }
            }

            for name in names {
                edges.push((name, id));
            }
            i += 1;
        }

        for (name, _) in &edges {
            _ = self.intern(name);
        }

        let mut dependents: Vec<HashSet<SymbolId>> = vec![HashSet::new(); self.syms.len()];
        for (name, dependent) in edges {
            let dep = self.intern(&name);
            dependents[dep.0 as usize].insert(dependent);
        }

        // Choice members depend on each other through the exclusion rule, and
        // the choice's selection depends on defaults and their conditions.
        let mut choice_edges: Vec<(String, ChoiceId)> = Vec::new();
        for (ci, choice) in self.choices.iter().enumerate() {
            let cid = ChoiceId(ci as u32);

            for a in &choice.members {
                choice_edges.push((self.syms[a.0 as usize].name.clone(), cid));
                for b in &choice.members {
                    if a != b {
                        dependents[a.0 as usize].insert(*b);
                    }
                }
            }

            let mut names: Vec<String> = Vec::new();
            if let Some(dep) = &choice.direct_dep {
                dep.visit_symbols(&mut |n| push_name(&mut names, n));
            }
            for default in &choice.defaults {
                names.push(default.target.to_string());
                if let Some(cond) = &default.condition {
                    cond.visit_symbols(&mut |n| push_name(&mut names, n));
                }
            }

            for name in names {
                choice_edges.push((name, cid));
            }
        }

        for (name, _) in &choice_edges {
            _ = self.intern(name);
        }
        if dependents.len() < self.syms.len() {
            dependents.resize(self.syms.len(), HashSet::new());
        }

        let mut choice_dependents: HashMap<SymbolId, Vec<ChoiceId>> = HashMap::new();
        for (name, cid) in choice_edges {
            let dep = self.intern(&name);
            let entry = choice_dependents.entry(dep).or_default();
            if !entry.contains(&cid) {
                entry.push(cid);
            }

            // A change that can move the selection must also reach the members.
            for member in self.choices[cid.0 as usize].members.clone() {
                dependents[dep.0 as usize].insert(member);
            }
        }

        self.dependents = dependents
            .into_iter()
            .map(|set| {
                let mut v: Vec<SymbolId> = set.into_iter().collect();
                v.sort();
                v
            })
            .collect();
        self.choice_dependents = choice_dependents;
    }

    /// Compute the stable menu identifiers used by the server's reset-by-menu:
    /// the lowercased prompt path with non-alphanumeric runs collapsed to `-`.
    fn build_menu_ids(&mut self) {
        let mut ids: HashMap<String, NodeId> = HashMap::new();

        fn rec(model: &Model, id: NodeId, path: &mut Vec<String>, ids: &mut HashMap<String, NodeId>) {
            let node = model.node(id);
            let title = match &node.item {
                NodeItem::Menu { title, .. } => Some(title.clone()),
                NodeItem::Choice(cid) => model.choice(*cid).prompt.as_ref().map(|p| p.title.to_string()),
                _ => None,
            };

            if let Some(title) = title {
                path.push(slug(&title));
                ids.entry(path.join("-")).or_insert(id);
                for child in &node.children {
                    rec(model, *child, path, ids);
                }
                path.pop();
            } else {
                for child in &node.children {
                    rec(model, *child, path, ids);
                }
            }
        }

        let mut path = Vec::new();
        for top in self.top_nodes.clone() {
            rec(self, top, &mut path, &mut ids);
        }

        self.menu_ids = ids;
    }
}

fn push_name(names: &mut Vec<String>, name: &str) {
    if is_symbol_name(name) {
        names.push(name.to_string());
    }
}

/// AND together a list of dependency expressions; empty is `y` (`None`).
fn conjoin(exprs: &[LocExpr]) -> Option<LocExpr> {
    let mut result: Option<LocExpr> = None;
    for e in exprs {
        result = LocExpr::and_opt(result, Some(e.clone()));
    }
    result
}

/// Whether a referenced name is a symbol reference rather than a constant:
/// `[A-Z0-9_]+`, excluding pure numbers.
pub fn is_symbol_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && !name.chars().all(|c| c.is_ascii_digit())
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use {
        super::{is_symbol_name, Model},
        crate::{
            parser::{Kconfig, Kind, ParseContext, PeekableChars},
            report::{Category, Report},
        },
        std::{collections::HashMap, path::Path},
    };

    pub(crate) fn build(input: &str) -> (Model, Report) {
        let ctx = ParseContext::with_env(HashMap::new());
        let kconfig = Kconfig::from_str(PeekableChars::new(input, Path::new("test")), Path::new("/tmp"), &ctx).unwrap();
        let mut report = Report::new();
        let model = Model::build(&kconfig, &ctx, &mut report).unwrap();
        (model, report)
    }

    #[test]
    fn symbols_are_interned_once() {
        let (model, _) = build(
            r#"config FOO
    bool "foo"
    depends on BAR

config BAR
    bool "bar"
"#,
        );

        let foo = model.lookup("FOO").unwrap();
        let bar = model.lookup("BAR").unwrap();
        assert_ne!(foo, bar);
        assert!(model.sym(foo).defined);
        assert!(model.sym(bar).defined);
        // FOO depends on BAR, so BAR's dependents include FOO.
        assert!(model.dependents[bar.0 as usize].contains(&foo));
    }

    #[test]
    fn multiple_definitions_merge_and_notify() {
        let (model, report) = build(
            r#"config FOO
    bool "foo"
    default y

config FOO
    bool
    default n
"#,
        );

        let foo = model.lookup("FOO").unwrap();
        assert_eq!(model.sym(foo).defaults.len(), 2);
        assert_eq!(model.sym(foo).locations.len(), 2);
        assert_eq!(report.by_category(Category::MultipleDefinition).count(), 1);
    }

    #[test]
    fn ignore_pragma_suppresses_multiple_definition() {
        let (_, report) = build(
            r#"config FOO # ignore: multiple-definition
    bool "foo"

config FOO # ignore: multiple-definition
    default y
"#,
        );

        assert_eq!(report.by_category(Category::MultipleDefinition).count(), 0);
    }

    #[test]
    fn non_bool_select_source_is_rejected() {
        let ctx = ParseContext::with_env(HashMap::new());
        let kconfig = Kconfig::from_str(
            PeekableChars::new(
                "config FOO\n    int \"foo\"\n    select BAR\n\nconfig BAR\n    bool \"bar\"\n",
                Path::new("test"),
            ),
            Path::new("/tmp"),
            &ctx,
        )
        .unwrap();
        let mut report = Report::new();
        assert!(Model::build(&kconfig, &ctx, &mut report).is_err());
    }

    #[test]
    fn non_bool_select_target_is_rejected() {
        let ctx = ParseContext::with_env(HashMap::new());
        let kconfig = Kconfig::from_str(
            PeekableChars::new(
                "config FOO\n    bool \"foo\"\n    select BAR\n\nconfig BAR\n    int \"bar\"\n",
                Path::new("test"),
            ),
            Path::new("/tmp"),
            &ctx,
        )
        .unwrap();
        let mut report = Report::new();
        assert!(Model::build(&kconfig, &ctx, &mut report).is_err());
    }

    #[test]
    fn choice_members_and_kind() {
        let (model, _) = build(
            r#"choice MODE
    prompt "mode"

    config MODE_A
        bool "a"

    config MODE_B
        bool "b"
endchoice
"#,
        );

        assert_eq!(model.choices.len(), 1);
        let choice = model.choice(super::ChoiceId(0));
        assert_eq!(choice.members.len(), 2);
        assert_eq!(choice.name.as_deref(), Some("MODE"));

        let a = model.lookup("MODE_A").unwrap();
        assert_eq!(model.sym(a).kind, Kind::Bool);
        assert_eq!(model.sym(a).choice, Some(super::ChoiceId(0)));

        // Members invalidate each other through the exclusion rule.
        let b = model.lookup("MODE_B").unwrap();
        assert!(model.dependents[a.0 as usize].contains(&b));
    }

    #[test]
    fn menu_ids_are_prompt_slugs() {
        let (model, _) = build(
            r#"menu "Serial flasher config"
config BAUD
    int "baud"
endmenu
"#,
        );

        assert!(model.menu_ids.contains_key("serial-flasher-config"));
    }

    #[test]
    fn symbol_name_shapes() {
        assert!(is_symbol_name("FOO_2"));
        assert!(!is_symbol_name("y"));
        assert!(!is_symbol_name("esp32"));
        assert!(!is_symbol_name("123"));
        assert!(!is_symbol_name(""));
    }
}
