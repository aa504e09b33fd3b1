//! The tracker facade.
//!
//! `DependencyTracker` is what the outside world talks to. The execution
//! layer drives it with cell lifecycle calls (`precheck_cell`,
//! `begin_cell`, `statement_finished`, `finish_cell`), a mutation feed, and
//! object-graph events (class bodies, instance clones, argument binds).
//! The front end asks it for batch freshness reports and cell provenance.
//!
//! One cell at a time, start to finish; there is no mid-cell abort. A cell
//! refused at precheck never starts, but once `begin_cell` runs, partial
//! execution permanently affects the shared namespace.

use crate::collect;
use crate::config::{MutableFlags, TrackerConfig};
use crate::linker::{self, BatchEntry, CellFreshness};
use crate::propagate::{update_deps, DepUpdate};
use crate::resolve;
use crate::slice;
use crate::store::{self, FrameView};
use crate::upsert::{self, UpsertFlags};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tangle_ast::{AssignTarget, ParsedCell, RefChain, Stmt, StmtKind};
use tangle_core::{
    CellId, CellNum, ContainerKind, FrameBindings, HostRuntime, IndexKey, MemberKey, MutationKind,
    ObjectId, PendingGarbage, TangleResult,
};
use tangle_model::scope::ANONYMOUS_SCOPE_NAME;
use tangle_model::{GraphContext, ScopeId, SymbolId};

/// One in-place mutation reported by the execution layer.
#[derive(Debug)]
pub struct MutationRecord {
    /// Identity of the mutated object.
    pub obj: ObjectId,
    /// What kind of mutation.
    pub kind: MutationKind,
    /// Symbols of the mutation's arguments, where resolvable.
    pub arg_symbols: Vec<SymbolId>,
    /// Identities of the mutation's arguments.
    pub arg_objects: Vec<ObjectId>,
}

/// Outcome of prechecking a cell for stale inputs.
#[derive(Debug)]
pub enum PrecheckOutcome {
    /// No stale inputs (or the user overrode a refusal); run the cell.
    Ready,
    /// At least one live input is stale; the cell was refused once.
    /// Re-submitting byte-identical source overrides the refusal.
    Refused {
        /// Human-readable description of each stale binding.
        warnings: Vec<String>,
    },
}

impl PrecheckOutcome {
    /// Whether the cell was refused.
    pub fn is_refused(&self) -> bool {
        matches!(self, PrecheckOutcome::Refused { .. })
    }
}

/// The dependency tracking engine, bound to one host runtime.
pub struct DependencyTracker<H: HostRuntime> {
    ctx: GraphContext,
    host: H,
    config: TrackerConfig,
    /// Flags the front end may toggle between cells.
    pub flags: MutableFlags,
    active_cell: Option<CellId>,
    active_position: Option<i64>,
    last_counter: CellNum,
    last_refused_source: Option<Arc<str>>,
    prev_refused_stale: FxHashSet<SymbolId>,
    mutations: Vec<MutationRecord>,
    pending_class_scopes: FxHashMap<Arc<str>, ScopeId>,
}

impl<H: HostRuntime> DependencyTracker<H> {
    /// Create a tracker with default configuration and a private
    /// pending-garbage set.
    pub fn new(host: H) -> Self {
        Self::with_config(host, PendingGarbage::new(), TrackerConfig::default())
    }

    /// Create a tracker sharing the host's pending-garbage set.
    pub fn with_pending(host: H, pending: PendingGarbage) -> Self {
        Self::with_config(host, pending, TrackerConfig::default())
    }

    /// Create a tracker with explicit configuration.
    pub fn with_config(host: H, pending: PendingGarbage, config: TrackerConfig) -> Self {
        DependencyTracker {
            ctx: GraphContext::with_pending(pending),
            host,
            config,
            flags: MutableFlags::default(),
            active_cell: None,
            active_position: None,
            last_counter: CellNum::ZERO,
            last_refused_source: None,
            prev_refused_stale: FxHashSet::default(),
            mutations: Vec::new(),
            pending_class_scopes: FxHashMap::default(),
        }
    }

    /// The graph context (read access for inspection and tests).
    pub fn context(&self) -> &GraphContext {
        &self.ctx
    }

    /// The host runtime.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access (the embedder owns the object graph).
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The global scope.
    pub fn global_scope(&self) -> ScopeId {
        self.ctx.global_scope()
    }

    /// The execution counter of the cell currently (or next) executing.
    pub fn cell_counter(&self) -> CellNum {
        self.ctx.cell_counter()
    }

    /// The counter stamped on the most recently begun cell.
    pub fn last_execution_counter(&self) -> CellNum {
        self.last_counter
    }

    /// Record which front-end cell is about to run, and optionally where it
    /// sits in the notebook.
    pub fn set_active_cell(&mut self, id: CellId, position: Option<i64>) {
        self.active_cell = Some(id);
        self.active_position = position;
    }

    /// Read and clear the "stale dependency observed" flag.
    pub fn test_and_clear_stale_flag(&mut self) -> bool {
        let was = self.ctx.stale_observed;
        self.ctx.stale_observed = false;
        was
    }

    /// Test-mode counter reset; clears all version history atomically.
    pub fn reset_counter(&mut self) {
        self.ctx.reset_counter();
        self.last_refused_source = None;
        self.prev_refused_stale.clear();
    }

    /// Look a global name up in the symbol graph.
    pub fn lookup_global(&self, name: &str) -> Option<SymbolId> {
        self.ctx
            .scopes
            .lookup_name(&self.host, self.ctx.global_scope(), &MemberKey::field(name))
    }

    /// Whether a symbol currently reports stale.
    pub fn is_stale(&self, sym: SymbolId) -> bool {
        self.ctx.sym(sym).map(|s| s.is_stale()).unwrap_or(false)
    }

    // =========================================================================
    // Cell lifecycle
    // =========================================================================

    /// Statically check a cell before execution.
    ///
    /// A cell with stale live inputs is refused once; submitting the exact
    /// same source again suppresses the stale markers for that one retry.
    /// On `Ready`, the live symbols' versions are recorded for the static
    /// provenance channel.
    pub fn precheck_cell(&mut self, cell: &ParsedCell) -> TangleResult<PrecheckOutcome> {
        let res = resolve::resolve_cell(&self.ctx, &self.host, cell)?;
        let identical = self
            .last_refused_source
            .as_deref()
            .map(|prev| prev == &*cell.source)
            .unwrap_or(false);
        if !identical {
            self.prev_refused_stale = res.stale.clone();
            if !res.stale.is_empty() {
                let warnings = self.refusal_warnings();
                for line in &warnings {
                    tracing::warn!("{}", line);
                }
                self.ctx.stale_observed = true;
                self.last_refused_source = Some(cell.source.clone());
                return Ok(PrecheckOutcome::Refused { warnings });
            }
        } else {
            // deliberate override: refresh nothing, just quiet the markers
            let prev = std::mem::take(&mut self.prev_refused_stale);
            for sym in prev {
                if let Some(s) = self.ctx.sym_mut(sym) {
                    s.suppressed = true;
                }
            }
        }

        let now = self.ctx.cell_counter();
        for &sym in &res.live {
            if let Some(s) = self.ctx.sym_mut(sym) {
                s.record_liveness(now);
            }
        }
        self.last_refused_source = None;
        Ok(PrecheckOutcome::Ready)
    }

    /// Start executing a cell: stamps it with the current counter and
    /// records its source for provenance.
    pub fn begin_cell(&mut self, cell: &ParsedCell) -> CellNum {
        let counter = self.ctx.cell_counter();
        self.last_counter = counter;
        if let Some(id) = self.active_cell.take() {
            self.ctx.counters_by_cell_id.insert(id, counter);
        }
        self.ctx
            .cell_source_by_num
            .insert(counter, cell.source.clone());
        counter
    }

    /// Report an in-place mutation observed during the current statement.
    pub fn record_mutation(
        &mut self,
        obj: ObjectId,
        kind: MutationKind,
        arg_symbols: Vec<SymbolId>,
        arg_objects: Vec<ObjectId>,
    ) {
        self.mutations.push(MutationRecord {
            obj,
            kind,
            arg_symbols,
            arg_objects,
        });
    }

    /// After-statement boundary: fold the statement's effects into the
    /// graph. `frame` carries the executing frame's bindings; `None` means
    /// module level (the host's globals).
    pub fn statement_finished(
        &mut self,
        scope: ScopeId,
        stmt: &Stmt,
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<()> {
        if self.config.track_dependencies {
            self.drain_mutations()?;
            self.handle_statement(scope, stmt, frame)?;
        }
        collect::drain_expired_namespaces(&mut self.ctx);
        Ok(())
    }

    /// Finish the current cell: resync out-of-band rebinds, run the
    /// collector, advance the counter.
    pub fn finish_cell(&mut self) -> TangleResult<()> {
        self.resync_symbols()?;
        collect::collect_garbage(&mut self.ctx, &self.host);
        self.ctx.advance_counter();
        Ok(())
    }

    // =========================================================================
    // Object-graph events
    // =========================================================================

    /// A class body is about to execute: create its namespace scope (bound
    /// later, when the class object exists).
    pub fn class_body_scope(&mut self, parent: ScopeId, name: impl Into<Arc<str>>) -> ScopeId {
        let name = name.into();
        let scope = self.ctx.scopes.make_namespace(
            parent,
            name.clone(),
            ObjectId::UNBOUND,
            ContainerKind::Attributes,
        );
        self.pending_class_scopes.insert(name, scope);
        scope
    }

    /// Calling a class produced an instance: clone the class namespace.
    pub fn instance_created(&mut self, class_obj: ObjectId, instance_obj: ObjectId) {
        let Some(class_ns) = self.ctx.namespace_for(class_obj) else {
            return;
        };
        if let Some(clone) = self.ctx.scopes.make_clone(class_ns, instance_obj) {
            self.ctx.register_namespace(instance_obj, clone);
            tracing::debug!(class = ?class_obj, instance = ?instance_obj, "cloned namespace");
        }
    }

    /// The scope a function symbol's body executes in.
    pub fn call_scope_for(&self, func: SymbolId) -> Option<ScopeId> {
        self.ctx
            .sym(func)?
            .function
            .as_ref()
            .map(|f| f.call_scope)
    }

    /// An argument was bound in a call frame; it depends on the actuals it
    /// was computed from.
    pub fn bind_argument(
        &mut self,
        call_scope: ScopeId,
        name: impl Into<Arc<str>>,
        obj: ObjectId,
        deps: FxHashSet<SymbolId>,
    ) -> TangleResult<SymbolId> {
        upsert::upsert_symbol(
            &mut self.ctx,
            &self.host,
            call_scope,
            MemberKey::Field(name.into()),
            obj,
            deps,
            UpsertFlags::quiet(),
        )
    }

    /// A container literal was constructed: mirror its elements in an
    /// anonymous namespace (renamed when the object is first bound).
    pub fn record_literal(
        &mut self,
        obj: ObjectId,
        elements: Vec<(IndexKey, Option<SymbolId>)>,
    ) -> TangleResult<ScopeId> {
        let parent = self.ctx.global_scope();
        let ns =
            store::materialize_namespace(&mut self.ctx, &self.host, obj, ANONYMOUS_SCOPE_NAME, parent);
        for (index, dep) in elements {
            let key = MemberKey::Index(index);
            let Some(elem_obj) = self.host.member(obj, &key)? else {
                continue;
            };
            let deps: FxHashSet<SymbolId> = dep.into_iter().collect();
            upsert::upsert_symbol(
                &mut self.ctx,
                &self.host,
                ns,
                key,
                elem_obj,
                deps,
                UpsertFlags::quiet(),
            )?;
        }
        Ok(ns)
    }

    // =========================================================================
    // Front-end queries
    // =========================================================================

    /// Link a batch of candidate cells against the current graph.
    pub fn check_and_link_cells(
        &self,
        entries: &[BatchEntry<'_>],
    ) -> TangleResult<CellFreshness> {
        let active = if self.config.backwards_staleness {
            None
        } else {
            self.active_position
        };
        linker::check_and_link_cells(&self.ctx, &self.host, &self.config, &self.flags, entries, active)
    }

    /// The cells a given execution transitively depended on, with source.
    pub fn cell_dependencies(
        &self,
        cell: CellNum,
    ) -> TangleResult<FxHashMap<CellNum, Arc<str>>> {
        slice::cell_dependencies(&self.ctx, cell)
    }

    // =========================================================================
    // Statement handling
    // =========================================================================

    fn frame_binding(&self, frame: Option<&dyn FrameBindings>, name: &str) -> Option<ObjectId> {
        frame
            .and_then(|f| f.binding(name))
            .or_else(|| self.host.global(name))
    }

    fn resolve_rvals(
        &mut self,
        scope: ScopeId,
        refs: &[RefChain],
    ) -> TangleResult<FxHashSet<SymbolId>> {
        let resolved = resolve::resolve_references(&self.ctx, &self.host, scope, refs.iter(), false)?;
        resolve::record_usage(&mut self.ctx, resolved.symbols.iter().copied());
        Ok(resolved.symbols)
    }

    fn handle_statement(
        &mut self,
        scope: ScopeId,
        stmt: &Stmt,
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<()> {
        match &stmt.kind {
            StmtKind::Assign {
                targets,
                value_refs,
            } => {
                let deps = self.resolve_rvals(scope, value_refs)?;
                for target in targets {
                    match target {
                        AssignTarget::Tuple(items) => {
                            self.assign_tuple(scope, items, &deps, value_refs, frame)?
                        }
                        other => {
                            self.upsert_single(scope, other, deps.clone(), UpsertFlags::assign(), frame)?;
                        }
                    }
                }
            }
            StmtKind::AugAssign { target, value_refs } => {
                let deps = self.resolve_rvals(scope, value_refs)?;
                self.upsert_single(scope, target, deps, UpsertFlags::augment(), frame)?;
            }
            StmtKind::For {
                target, iter_refs, ..
            } => {
                let deps = self.resolve_rvals(scope, iter_refs)?;
                // loop bindings must not invalidate dependents per iteration
                match target {
                    AssignTarget::Tuple(items) => {
                        for item in items {
                            self.upsert_single(scope, item, deps.clone(), UpsertFlags::quiet(), frame)?;
                        }
                    }
                    other => {
                        self.upsert_single(scope, other, deps, UpsertFlags::quiet(), frame)?;
                    }
                }
            }
            StmtKind::FunctionDef {
                name,
                default_refs,
                body_refs,
            } => {
                let deps = self.resolve_rvals(scope, default_refs)?;
                let Some(obj) = self.frame_binding(frame, name) else {
                    return Ok(());
                };
                upsert::upsert_symbol(
                    &mut self.ctx,
                    &self.host,
                    scope,
                    MemberKey::Field(name.clone()),
                    obj,
                    deps,
                    UpsertFlags::function_def(body_refs.clone()),
                )?;
            }
            StmtKind::ClassDef { name, base_refs } => {
                let deps = self.resolve_rvals(scope, base_refs)?;
                let Some(obj) = self.frame_binding(frame, name) else {
                    return Ok(());
                };
                let class_scope = self.pending_class_scopes.remove(name).unwrap_or_else(|| {
                    self.ctx.scopes.make_namespace(
                        scope,
                        name.clone(),
                        ObjectId::UNBOUND,
                        ContainerKind::Attributes,
                    )
                });
                if let Some(ns) = self
                    .ctx
                    .scopes
                    .get_mut(class_scope)
                    .and_then(|s| s.ns.as_mut())
                {
                    ns.object_id = obj;
                }
                self.ctx.register_namespace(obj, class_scope);
                upsert::upsert_symbol(
                    &mut self.ctx,
                    &self.host,
                    scope,
                    MemberKey::Field(name.clone()),
                    obj,
                    deps,
                    UpsertFlags::class_def(class_scope),
                )?;
            }
            StmtKind::Import { names } => {
                for name in names {
                    let Some(obj) = self.frame_binding(frame, name) else {
                        continue;
                    };
                    upsert::upsert_symbol(
                        &mut self.ctx,
                        &self.host,
                        scope,
                        MemberKey::Field(name.clone()),
                        obj,
                        FxHashSet::default(),
                        UpsertFlags::import(),
                    )?;
                }
            }
            StmtKind::Delete { targets } => {
                for target in targets {
                    let view = FrameView::new(frame, &self.host);
                    let Some(st) = store::resolve_store_target(
                        &mut self.ctx,
                        &self.host,
                        scope,
                        &view,
                        target,
                        false,
                    )?
                    else {
                        continue;
                    };
                    upsert::delete_symbol(&mut self.ctx, &self.host, st.scope, &st.key);
                }
            }
            StmtKind::Expr { refs } => {
                // no lvalue: just make sure usage timestamps get bumped
                self.resolve_rvals(scope, refs)?;
            }
        }
        Ok(())
    }

    fn upsert_single(
        &mut self,
        scope: ScopeId,
        target: &AssignTarget,
        deps: FxHashSet<SymbolId>,
        flags: UpsertFlags,
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<Option<SymbolId>> {
        if let AssignTarget::Opaque(desc) = target {
            tracing::info!(shape = &**desc, "skipping untrackable store target");
            return Ok(None);
        }
        let view = FrameView::new(frame, &self.host);
        let Some(st) =
            store::resolve_store_target(&mut self.ctx, &self.host, scope, &view, target, true)?
        else {
            return Ok(None);
        };
        let Some(obj) = st.obj else {
            return Ok(None);
        };
        let sym = upsert::upsert_symbol(
            &mut self.ctx,
            &self.host,
            st.scope,
            st.key.clone(),
            obj,
            deps,
            flags,
        )?;
        // the assigned object's literal namespace acquires its name here
        let display = match &st.key {
            MemberKey::Field(name) => name.to_string(),
            MemberKey::Index(index) => index.to_string(),
        };
        store::fixup_literal_namespace(&mut self.ctx, obj, &display, st.scope);
        Ok(Some(sym))
    }

    fn assign_tuple(
        &mut self,
        scope: ScopeId,
        items: &[AssignTarget],
        deps: &FxHashSet<SymbolId>,
        value_refs: &[RefChain],
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<()> {
        // element-wise dependencies when the rhs is one tracked container
        let rhs_ns = if value_refs.len() == 1 {
            match resolve::resolve_reference(&self.ctx, &self.host, scope, &value_refs[0])?.matched
            {
                Some(sym) => self
                    .ctx
                    .sym(sym)
                    .and_then(|s| self.ctx.namespace_for(s.obj)),
                None => None,
            }
        } else {
            None
        };
        match rhs_ns {
            Some(ns_scope) => self.unpack_from_namespace(scope, items, ns_scope, frame),
            None => {
                for item in items {
                    self.assign_unpacked_item(scope, item, deps.clone(), frame)?;
                }
                Ok(())
            }
        }
    }

    fn assign_unpacked_item(
        &mut self,
        scope: ScopeId,
        item: &AssignTarget,
        deps: FxHashSet<SymbolId>,
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<()> {
        match item {
            AssignTarget::Tuple(inner) => {
                let elem_ns = deps
                    .iter()
                    .next()
                    .and_then(|s| self.ctx.sym(*s))
                    .and_then(|s| self.ctx.namespace_for(s.obj));
                match elem_ns {
                    Some(ns) => self.unpack_from_namespace(scope, inner, ns, frame),
                    None => {
                        for nested in inner {
                            self.assign_unpacked_item(scope, nested, deps.clone(), frame)?;
                        }
                        Ok(())
                    }
                }
            }
            other => self
                .upsert_single(scope, other, deps, UpsertFlags::assign(), frame)
                .map(|_| ()),
        }
    }

    fn unpack_from_namespace(
        &mut self,
        scope: ScopeId,
        items: &[AssignTarget],
        ns_scope: ScopeId,
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<()> {
        let Some(ns_obj) = self
            .ctx
            .scopes
            .get(ns_scope)
            .and_then(|s| s.ns.as_ref())
            .map(|ns| ns.object_id)
        else {
            return Ok(());
        };
        let total = self.host.container_len(ns_obj).unwrap_or(items.len());
        let elem_deps = |ctx: &GraphContext, i: usize| -> FxHashSet<SymbolId> {
            ctx.scopes
                .member_entry(ns_scope, &MemberKey::index(i as i64))
                .into_iter()
                .collect()
        };
        let starred_at = items
            .iter()
            .position(|t| matches!(t, AssignTarget::Starred(_)));
        match starred_at {
            None => {
                for (i, item) in items.iter().enumerate() {
                    let deps = elem_deps(&self.ctx, i);
                    self.assign_unpacked_item(scope, item, deps, frame)?;
                }
            }
            Some(k) => {
                for (i, item) in items[..k].iter().enumerate() {
                    let deps = elem_deps(&self.ctx, i);
                    self.assign_unpacked_item(scope, item, deps, frame)?;
                }
                let tail_count = items.len() - k - 1;
                let mid_end = total.saturating_sub(tail_count).max(k);
                for (j, item) in items[k + 1..].iter().enumerate() {
                    let deps = elem_deps(&self.ctx, mid_end + j);
                    self.assign_unpacked_item(scope, item, deps, frame)?;
                }
                let absorbed: Vec<Option<SymbolId>> = (k..mid_end)
                    .map(|i| {
                        self.ctx
                            .scopes
                            .member_entry(ns_scope, &MemberKey::index(i as i64))
                    })
                    .collect();
                if let AssignTarget::Starred(inner) = &items[k] {
                    self.starred_target(scope, inner, absorbed, frame)?;
                }
            }
        }
        Ok(())
    }

    fn starred_target(
        &mut self,
        scope: ScopeId,
        inner: &AssignTarget,
        absorbed: Vec<Option<SymbolId>>,
        frame: Option<&dyn FrameBindings>,
    ) -> TangleResult<()> {
        let view = FrameView::new(frame, &self.host);
        let Some(st) =
            store::resolve_store_target(&mut self.ctx, &self.host, scope, &view, inner, true)?
        else {
            return Ok(());
        };
        let Some(obj) = st.obj else {
            return Ok(());
        };
        let name = match &st.key {
            MemberKey::Field(name) => name.to_string(),
            MemberKey::Index(index) => index.to_string(),
        };
        let ns = store::materialize_namespace(&mut self.ctx, &self.host, obj, &name, st.scope);
        for (i, dep) in absorbed.into_iter().enumerate() {
            let key = MemberKey::index(i as i64);
            let Some(elem_obj) = self.host.member(obj, &key)? else {
                continue;
            };
            let deps: FxHashSet<SymbolId> = dep.into_iter().collect();
            upsert::upsert_symbol(
                &mut self.ctx,
                &self.host,
                ns,
                key,
                elem_obj,
                deps,
                UpsertFlags {
                    overwrite: false,
                    propagate: false,
                    ..Default::default()
                },
            )?;
        }
        upsert::upsert_symbol(
            &mut self.ctx,
            &self.host,
            st.scope,
            st.key,
            obj,
            FxHashSet::default(),
            UpsertFlags::assign(),
        )?;
        Ok(())
    }

    // =========================================================================
    // Mutation feed
    // =========================================================================

    fn drain_mutations(&mut self) -> TangleResult<()> {
        let mutations = std::mem::take(&mut self.mutations);
        for record in mutations {
            tracing::debug!(obj = ?record.obj, kind = ?record.kind, "processing mutation");
            resolve::record_usage(&mut self.ctx, record.arg_symbols.iter().copied());
            if record.kind == MutationKind::ArgumentMutate {
                for &sym in &record.arg_symbols {
                    update_deps(&mut self.ctx, sym, &FxHashSet::default(), DepUpdate::mutation());
                }
                continue;
            }
            if record.kind == MutationKind::Append && record.arg_objects.len() == 1 {
                // register the appended element as a namespace child first,
                // so propagation below stays inside the container
                let owner = self
                    .ctx
                    .first_full_symbol(record.obj)
                    .and_then(|owner| self.ctx.sym(owner))
                    .map(|sym| {
                        let name = match &sym.key {
                            MemberKey::Field(name) => name.to_string(),
                            MemberKey::Index(index) => index.to_string(),
                        };
                        (name, sym.scope)
                    });
                if let Some((name, parent)) = owner {
                    let ns = store::materialize_namespace(
                        &mut self.ctx,
                        &self.host,
                        record.obj,
                        &name,
                        parent,
                    );
                    if let Ok(len) = self.host.container_len(record.obj) {
                        if len > 0 {
                            let key = MemberKey::index((len - 1) as i64);
                            upsert::upsert_symbol(
                                &mut self.ctx,
                                &self.host,
                                ns,
                                key,
                                record.arg_objects[0],
                                record.arg_symbols.iter().copied().collect(),
                                UpsertFlags {
                                    overwrite: false,
                                    propagate: false,
                                    ..Default::default()
                                },
                            )?;
                        }
                    }
                }
            }
            let arg_deps: FxHashSet<SymbolId> = record.arg_symbols.iter().copied().collect();
            let aliases: Vec<SymbolId> = self.ctx.aliases.of(record.obj).collect();
            resolve::record_usage(&mut self.ctx, aliases.iter().copied());
            for alias in aliases {
                update_deps(&mut self.ctx, alias, &arg_deps, DepUpdate::mutation());
            }
        }
        Ok(())
    }

    // =========================================================================
    // Resync
    // =========================================================================

    /// Re-point symbols whose global binding was replaced while tracing was
    /// off (a rebind the statement stream never reported).
    fn resync_symbols(&mut self) -> TangleResult<()> {
        let now = self.ctx.cell_counter();
        let global = self.ctx.global_scope();
        let candidates: Vec<SymbolId> = self
            .ctx
            .symbols
            .iter()
            .filter(|(_, s)| s.defined_cell == now && s.scope == global)
            .map(|(id, _)| id)
            .collect();
        for id in candidates {
            let Some((name, old_obj, cached)) = self
                .ctx
                .sym(id)
                .and_then(|s| s.key.as_field().map(|n| (n.clone(), s.obj, s.cached_obj)))
            else {
                continue;
            };
            let Some(new_obj) = self.host.global(&name) else {
                continue;
            };
            if old_obj == new_obj {
                continue;
            }
            tracing::debug!(name = &*name, old = ?old_obj, new = ?new_obj, "resyncing symbol");

            // the replaced value may be the tail of a tracked sequence
            let mut related: Vec<SymbolId> = self.ctx.aliases.of(cached).collect();
            related.extend(self.ctx.aliases.of(old_obj));
            for alias in related {
                let Some(alias_scope) = self.ctx.sym(alias).map(|s| s.scope) else {
                    continue;
                };
                let Some(ns_obj) = self
                    .ctx
                    .scopes
                    .get(alias_scope)
                    .and_then(|s| s.ns.as_ref())
                    .map(|ns| ns.object_id)
                else {
                    continue;
                };
                if !self.host.is_live(ns_obj)
                    || self.host.container_kind(ns_obj) != ContainerKind::PositionIndexed
                {
                    continue;
                }
                let Ok(len) = self.host.container_len(ns_obj) else {
                    continue;
                };
                if len == 0 {
                    continue;
                }
                let tail = MemberKey::index((len - 1) as i64);
                if self.host.member(ns_obj, &tail)? == Some(new_obj) {
                    let parents: FxHashSet<SymbolId> = self
                        .ctx
                        .sym(alias)
                        .map(|s| s.parents.clone())
                        .unwrap_or_default();
                    upsert::upsert_symbol(
                        &mut self.ctx,
                        &self.host,
                        alias_scope,
                        tail,
                        new_obj,
                        parents,
                        UpsertFlags::quiet(),
                    )?;
                }
            }

            // atomic alias move plus registry re-key
            self.ctx.aliases.discard(cached, id);
            self.ctx.aliases.discard(old_obj, id);
            self.ctx.aliases.add(new_obj, id);
            if let Some(ns_scope) = self.ctx.namespaces.remove(&old_obj) {
                if let Some(ns) = self
                    .ctx
                    .scopes
                    .get_mut(ns_scope)
                    .and_then(|s| s.ns.as_mut())
                {
                    ns.object_id = new_obj;
                    ns.tombstoned = false;
                }
                self.ctx.register_namespace(new_obj, ns_scope);
            }
            if let Some(s) = self.ctx.sym_mut(id) {
                s.obj = new_obj;
                s.cached_obj = new_obj;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Refusal warnings
    // =========================================================================

    fn refusal_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let cap = self.config.max_refusal_warnings;
        let total = self.prev_refused_stale.len();
        for (i, &sym) in self.prev_refused_stale.iter().enumerate() {
            if i >= cap {
                warnings.push(format!(
                    "{} more bindings with stale inputs skipped...",
                    total - cap
                ));
                break;
            }
            let Some(s) = self.ctx.sym(sym) else {
                continue;
            };
            if !s.defined_cell.is_set() {
                continue;
            }
            let ancestors = if s.fresher_ancestors.is_empty() {
                &s.namespace_stale_refs
            } else {
                &s.fresher_ancestors
            };
            let names: Vec<String> = ancestors
                .iter()
                .map(|a| format!("`{}`", self.ctx.readable_name(*a)))
                .collect();
            warnings.push(format!(
                "`{}` defined in cell {} may depend on old version(s) of [{}] \
                 (latest update in cell {}). Run the same cell again to override \
                 and execute anyway.",
                self.ctx.readable_name(sym),
                s.defined_cell,
                names.join(", "),
                s.required_cell,
            ));
        }
        warnings
    }
}
