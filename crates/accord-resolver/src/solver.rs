//! The conflict-driven resolution engine.
//!
//! A state machine over propagating / deciding / conflict / solved / failed.
//! Unit propagation derives forced assignments from incompatibilities; the
//! decision step asks the provider for the newest compatible candidate and
//! translates its metadata into new incompatibilities; conflicts are
//! resolved backwards into derived incompatibilities, backtracking to the
//! level where the conflict is no longer implied. An empty derived
//! incompatibility means no solution exists, and the chain that produced it
//! becomes the explanation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use accord_core::{
    requirement::{variants_are_disjoint, variants_marker_union},
    Category, Environment, Marker, Package, Requirement, Source, Version,
};

use crate::error::ResolveError;
use crate::graph::{DepEdge, DependencyGraph, ResolvedNode};
use crate::incompatibility::{Cause, Incompatibility, PackageKey};
use crate::partial_solution::{PartialSolution, Relation};
use crate::provider::Provider;
use crate::report::DerivationTree;
use crate::resolution::{DependencyRef, Resolution, ResolvedPackage};
use crate::term::{SetRelation, Term};

/// Default ceiling on decision steps before reporting a timeout.
pub const DEFAULT_MAX_STEPS: u64 = 20_000;

/// Cooperative cancellation signal, checked at every decision step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Caller-supplied knobs for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Concrete target environment. When set, markers are evaluated up
    /// front and inapplicable requirements are dropped; when unset, each
    /// requirement keeps a symbolic marker scope and disjoint same-name
    /// scopes resolve independently.
    pub environment: Option<Environment>,
    /// Extras requested on the root package.
    pub extras: BTreeSet<String>,
    /// Decision-step budget. Exhaustion is a `Timeout`, not `Unsatisfiable`.
    pub max_steps: u64,
    /// Wall-clock budget, checked alongside the step budget.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            environment: None,
            extras: BTreeSet::new(),
            max_steps: DEFAULT_MAX_STEPS,
            timeout: None,
            cancel: None,
        }
    }
}

/// Resolve the root package's requirements into a consistent package set.
pub fn resolve<P: Provider>(
    root: &Package,
    provider: &P,
    options: &ResolveOptions,
) -> Result<Resolution, ResolveError> {
    Solver::new(root, provider, options).solve()
}

enum State {
    Propagating(Vec<PackageKey>),
    Deciding,
    Solved,
}

struct Solver<'a, P: Provider> {
    root: &'a Package,
    provider: &'a P,
    options: &'a ResolveOptions,

    incompatibilities: Vec<Incompatibility>,
    /// Propagation index: package to the incompatibilities mentioning it.
    by_package: HashMap<PackageKey, Vec<usize>>,
    solution: PartialSolution,

    /// Marker partitions per package name; the index is the partition id.
    partitions: HashMap<String, Vec<Marker>>,
    /// Accumulated marker scope per key, for the resolved output.
    scopes: HashMap<PackageKey, Marker>,
    /// First-registered non-registry source pin per package name.
    sources: HashMap<String, Source>,
    /// Names allowed to match pre-release candidates.
    prereleases: HashSet<String>,
    /// Extras requested on each package by its dependers.
    requested_extras: HashMap<PackageKey, BTreeSet<String>>,
    /// Chosen packages by name and version, kept across backtracking.
    package_cache: HashMap<(String, Version), Package>,
    /// Dependency edges observed during translation, filtered against the
    /// final decisions when the graph is built.
    edge_log: Vec<EdgeRecord>,

    warnings: Vec<String>,
    steps: u64,
    started: Instant,
}

struct EdgeRecord {
    from: PackageKey,
    from_version: Version,
    to: PackageKey,
    category: Category,
    optional: bool,
}

impl<'a, P: Provider> Solver<'a, P> {
    fn new(root: &'a Package, provider: &'a P, options: &'a ResolveOptions) -> Self {
        Self {
            root,
            provider,
            options,
            incompatibilities: Vec::new(),
            by_package: HashMap::new(),
            solution: PartialSolution::new(),
            partitions: HashMap::new(),
            scopes: HashMap::new(),
            sources: HashMap::new(),
            prereleases: HashSet::new(),
            requested_extras: HashMap::new(),
            package_cache: HashMap::new(),
            edge_log: Vec::new(),
            warnings: Vec::new(),
            steps: 0,
            started: Instant::now(),
        }
    }

    fn solve(mut self) -> Result<Resolution, ResolveError> {
        let root_version = self.root.version().clone();
        tracing::debug!("resolving dependencies of {} {root_version}", self.root.name());

        self.solution.decide(PackageKey::Root, root_version.clone());
        let active = self
            .root
            .active_requirements(&self.options.extras)
            .map_err(|extra| ResolveError::UnknownExtra {
                package: self.root.name().to_string(),
                extra,
            })?;
        let (_, touched) = self.add_dependency_incompatibilities(
            &PackageKey::Root,
            &root_version,
            &Marker::True,
            &active,
        )?;

        let mut state = State::Propagating(touched);
        loop {
            state = match state {
                State::Propagating(changed) => {
                    self.propagate(changed)?;
                    State::Deciding
                }
                State::Deciding => {
                    self.check_budget()?;
                    match self.decide()? {
                        Some(changed) => State::Propagating(changed),
                        None => State::Solved,
                    }
                }
                State::Solved => return self.build_resolution(),
            };
        }
    }

    /// Unit propagation to a fixed point, resolving conflicts as they
    /// surface.
    fn propagate(&mut self, seeds: Vec<PackageKey>) -> Result<(), ResolveError> {
        let mut changed: VecDeque<PackageKey> = seeds.into_iter().collect();
        while let Some(package) = changed.pop_front() {
            let indices: Vec<usize> = self
                .by_package
                .get(&package)
                .cloned()
                .unwrap_or_default();
            // Newest incompatibilities first, so fresh conflicts surface
            // before stale ones re-derive the same terms.
            for &idx in indices.iter().rev() {
                match self.solution.relation(&self.incompatibilities[idx]) {
                    Relation::Satisfied => {
                        let root_cause = self.resolve_conflict(idx)?;
                        let incompat = &self.incompatibilities[root_cause];
                        match self.solution.relation(incompat) {
                            Relation::AlmostSatisfied(key) => {
                                let term = incompat
                                    .term_for(&key)
                                    .expect("almost-satisfied key must have a term")
                                    .negate();
                                self.solution.derive(key.clone(), term, root_cause);
                                changed.clear();
                                changed.push_back(key);
                            }
                            _ => unreachable!(
                                "conflict resolution must leave an almost-satisfied incompatibility"
                            ),
                        }
                        break;
                    }
                    Relation::AlmostSatisfied(key) => {
                        let term = self.incompatibilities[idx]
                            .term_for(&key)
                            .expect("almost-satisfied key must have a term")
                            .negate();
                        self.solution.derive(key.clone(), term, idx);
                        if !changed.contains(&key) {
                            changed.push_back(key);
                        }
                    }
                    Relation::Contradicted(_) | Relation::Inconclusive => {}
                }
            }
        }
        Ok(())
    }

    /// Backward conflict resolution: combine the conflicting incompatibility
    /// with the causes of its satisfiers until backtracking can escape it,
    /// or until the contradiction is unconditional.
    fn resolve_conflict(&mut self, incompatibility: usize) -> Result<usize, ResolveError> {
        tracing::debug!(
            "conflict: {}",
            self.incompatibilities[incompatibility]
        );
        let mut current = incompatibility;
        let mut made_new = false;
        loop {
            let incompat = self.incompatibilities[current].clone();
            if incompat.is_failure() {
                let derivation = DerivationTree::from_store(&self.incompatibilities, current);
                return Err(ResolveError::Unsatisfiable { derivation });
            }

            let mut most_recent: Option<(PackageKey, Term, usize)> = None;
            let mut difference: Option<Term> = None;
            let mut previous_satisfier_level: u32 = 1;

            for (key, term) in incompat.terms() {
                let satisfier_index = self.solution.satisfier(key, term);
                let satisfier_level = self.solution.assignment(satisfier_index).decision_level;
                let replaces_most_recent = match &most_recent {
                    None => true,
                    Some((_, _, current_index)) => *current_index < satisfier_index,
                };
                if replaces_most_recent {
                    if let Some((_, _, current_index)) = &most_recent {
                        let current_level =
                            self.solution.assignment(*current_index).decision_level;
                        previous_satisfier_level = previous_satisfier_level.max(current_level);
                    }
                    most_recent = Some((key.clone(), term.clone(), satisfier_index));
                    difference = None;
                } else {
                    previous_satisfier_level = previous_satisfier_level.max(satisfier_level);
                }

                if let Some((recent_key, recent_term, recent_index)) = &most_recent {
                    if recent_key == key {
                        let satisfier_term = self.solution.assignment(*recent_index).term();
                        let diff = satisfier_term.difference(recent_term);
                        if diff.constraint().is_empty() && diff.is_positive() {
                            difference = None;
                        } else {
                            let remainder_level = self
                                .solution
                                .assignment(self.solution.satisfier(recent_key, &diff.negate()))
                                .decision_level;
                            previous_satisfier_level =
                                previous_satisfier_level.max(remainder_level);
                            difference = Some(diff);
                        }
                    }
                }
            }

            let (recent_key, _, recent_index) =
                most_recent.expect("a non-failure incompatibility has terms");
            let satisfier = self.solution.assignment(recent_index).clone();

            if previous_satisfier_level < satisfier.decision_level || satisfier.cause().is_none()
            {
                tracing::debug!(
                    "backtracking to decision level {previous_satisfier_level}"
                );
                self.solution.backtrack(previous_satisfier_level);
                if made_new {
                    self.register(current);
                }
                return Ok(current);
            }

            let cause = satisfier.cause().expect("derivation has a cause");
            let mut terms: BTreeMap<PackageKey, Term> = BTreeMap::new();
            for (key, term) in incompat.terms() {
                if key != &recent_key {
                    merge_term(&mut terms, key.clone(), term.clone());
                }
            }
            for (key, term) in self.incompatibilities[cause].terms() {
                if key != &satisfier.key {
                    merge_term(&mut terms, key.clone(), term.clone());
                }
            }
            if let Some(diff) = &difference {
                merge_term(&mut terms, recent_key.clone(), diff.negate());
            }

            let derived = Incompatibility::new(
                terms,
                Cause::Conflict {
                    left: current,
                    right: cause,
                },
            );
            tracing::debug!("derived: {derived}");
            self.incompatibilities.push(derived);
            current = self.incompatibilities.len() - 1;
            made_new = true;
        }
    }

    /// Choose the next package, query the provider, translate its metadata,
    /// and decide on it. `None` means every reachable package is decided.
    fn decide(&mut self) -> Result<Option<Vec<PackageKey>>, ResolveError> {
        let undecided = self.solution.undecided_positive();
        if undecided.is_empty() {
            return Ok(None);
        }

        // The package with the fewest outstanding requirements; ties break
        // on key order for determinism.
        let (key, constraint) = undecided
            .into_iter()
            .min_by(|a, b| {
                self.solution
                    .derivation_count(&a.0)
                    .cmp(&self.solution.derivation_count(&b.0))
                    .then_with(|| a.0.cmp(&b.0))
            })
            .expect("undecided set is non-empty");

        let name = key.name().to_string();
        let source = self
            .sources
            .get(&name)
            .cloned()
            .unwrap_or(Source::Registry);
        let include_prereleases =
            self.prereleases.contains(&name) || constraint.mentions_prerelease();

        let mut candidates = self
            .provider
            .candidates(&name, &source, &constraint, include_prereleases)?;
        candidates.retain(|p| {
            if include_prereleases {
                constraint.allows_unrestricted(p.version())
            } else {
                constraint.allows(p.version())
            }
        });
        candidates.sort_by(|a, b| b.version().cmp(a.version()));

        let Some(package) = candidates.into_iter().next() else {
            tracing::debug!("no versions of {name} match {constraint}");
            self.add_and_register(Incompatibility::no_versions(key.clone(), constraint));
            return Ok(Some(vec![key]));
        };

        let version = package.version().clone();
        let metadata = self.provider.metadata(&package)?;
        let extras = self
            .requested_extras
            .get(&key)
            .cloned()
            .unwrap_or_default();
        let active = package
            .select_requirements(&metadata, &extras)
            .map_err(|extra| ResolveError::UnknownExtra {
                package: name.clone(),
                extra,
            })?;
        let scope = self.scopes.get(&key).cloned().unwrap_or(Marker::True);

        self.package_cache
            .insert((name.clone(), version.clone()), package);
        let (new_indices, mut touched) =
            self.add_dependency_incompatibilities(&key, &version, &scope, &active)?;

        // Deciding would immediately satisfy one of the new
        // incompatibilities; let propagation raise the conflict instead.
        let conflict = new_indices.iter().any(|&idx| {
            self.incompatibilities[idx].terms().iter().all(|(k, t)| {
                k == &key || self.solution.term_relation(k, t) == SetRelation::Subset
            })
        });

        if !conflict {
            tracing::debug!("selecting {name} {version}");
            self.solution.decide(key.clone(), version);
        }
        if !touched.contains(&key) {
            touched.push(key);
        }
        Ok(Some(touched))
    }

    /// Translate a package's active requirements into dependency
    /// incompatibilities, registering marker partitions, source pins,
    /// pre-release opt-ins, and requested extras on the way.
    fn add_dependency_incompatibilities(
        &mut self,
        depender: &PackageKey,
        depender_version: &Version,
        depender_scope: &Marker,
        requirements: &[Requirement],
    ) -> Result<(Vec<usize>, Vec<PackageKey>), ResolveError> {
        self.check_multi_constraint_groups(depender, depender_scope, requirements);

        let depender_term = Term::exactly(depender_version.clone());
        let mut new_indices = Vec::new();
        let mut touched = vec![depender.clone()];

        for requirement in requirements {
            let effective_scope = match &self.options.environment {
                Some(env) => {
                    if !requirement.marker.evaluate(env) {
                        tracing::trace!(
                            "skipping {} for this environment",
                            requirement.name
                        );
                        continue;
                    }
                    Marker::True
                }
                None => {
                    let scope = depender_scope.and(&requirement.marker).simplify();
                    if matches!(scope, Marker::False) {
                        continue;
                    }
                    scope
                }
            };

            let partition = if self.options.environment.is_some() {
                0
            } else {
                self.partition_for(&requirement.name, &effective_scope)
            };
            let dep_key = PackageKey::named(requirement.name.clone(), partition);
            if dep_key == *depender {
                // Packages occasionally depend on themselves via extras.
                continue;
            }

            if !requirement.is_registry() {
                match self.sources.get(&requirement.name) {
                    None => {
                        self.sources
                            .insert(requirement.name.clone(), requirement.source.clone());
                    }
                    Some(existing)
                        if existing.identity() != requirement.source.identity() =>
                    {
                        let warning = format!(
                            "conflicting source pins for {}; keeping the first",
                            requirement.name
                        );
                        self.warn(warning);
                    }
                    Some(_) => {}
                }
            }
            if requirement.allows_prereleases || requirement.constraint.mentions_prerelease() {
                self.prereleases.insert(requirement.name.clone());
            }

            let recorded_scope = if self.options.environment.is_some() {
                requirement.marker.clone()
            } else {
                effective_scope.clone()
            };
            self.scopes
                .entry(dep_key.clone())
                .and_modify(|scope| *scope = scope.or(&recorded_scope).simplify())
                .or_insert(recorded_scope);

            if !requirement.extras.is_empty() {
                let entry = self.requested_extras.entry(dep_key.clone()).or_default();
                let before = entry.len();
                entry.extend(requirement.extras.iter().cloned());
                let grew = entry.len() > before;
                let requested = entry.clone();
                if grew {
                    if let Some(version) = self.solution.decision_for(&dep_key).cloned() {
                        // The package is already decided; activate the newly
                        // requested extras against the chosen version.
                        let (indices, more_touched) =
                            self.activate_extras(&dep_key, &version, &requested)?;
                        new_indices.extend(indices);
                        touched.extend(more_touched);
                    }
                }
            }

            self.edge_log.push(EdgeRecord {
                from: depender.clone(),
                from_version: depender_version.clone(),
                to: dep_key.clone(),
                category: requirement.category,
                optional: requirement.optional,
            });

            let incompatibility = Incompatibility::dependency(
                depender.clone(),
                depender_term.clone(),
                dep_key.clone(),
                requirement.constraint.clone(),
            );
            let idx = self.add_and_register(incompatibility);
            new_indices.push(idx);
            if !touched.contains(&dep_key) {
                touched.push(dep_key);
            }
        }

        Ok((new_indices, touched))
    }

    /// Re-translate an already-decided package's metadata under a wider
    /// extras request.
    fn activate_extras(
        &mut self,
        key: &PackageKey,
        version: &Version,
        extras: &BTreeSet<String>,
    ) -> Result<(Vec<usize>, Vec<PackageKey>), ResolveError> {
        let package = self
            .package_cache
            .get(&(key.name().to_string(), version.clone()))
            .cloned()
            .expect("decided packages are cached");
        let metadata = self.provider.metadata(&package)?;
        let active = package
            .select_requirements(&metadata, extras)
            .map_err(|extra| ResolveError::UnknownExtra {
                package: key.name().to_string(),
                extra,
            })?;
        let scope = self.scopes.get(key).cloned().unwrap_or(Marker::True);
        self.add_dependency_incompatibilities(key, version, &scope, &active)
    }

    /// Flag modeling errors in declared multi-constraint groups: variants
    /// with overlapping markers, and variants whose markers leave a gap in
    /// the depender's scope.
    fn check_multi_constraint_groups(
        &mut self,
        depender: &PackageKey,
        depender_scope: &Marker,
        requirements: &[Requirement],
    ) {
        let mut by_name: BTreeMap<&str, Vec<&Requirement>> = BTreeMap::new();
        for requirement in requirements {
            by_name
                .entry(requirement.name.as_str())
                .or_default()
                .push(requirement);
        }
        for (name, group) in by_name {
            if group.len() < 2 {
                continue;
            }
            let owned: Vec<Requirement> = group.iter().map(|r| (*r).clone()).collect();
            if !variants_are_disjoint(&owned) {
                let warning = format!(
                    "multi-constraint dependency {name} of {depender} has overlapping markers"
                );
                self.warn(warning);
                continue;
            }
            let union = variants_marker_union(&owned);
            let gap = depender_scope.and(&union.negate());
            if !gap.is_contradiction() {
                let warning = format!(
                    "multi-constraint dependency {name} of {depender} leaves a marker gap ({})",
                    gap.simplify()
                );
                self.warn(warning);
            }
        }
    }

    /// Record a modeling warning once.
    fn warn(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            tracing::warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    /// Partition lookup for symbolic marker scopes: join the first
    /// non-disjoint partition (widening its scope), or open a new one.
    fn partition_for(&mut self, name: &str, scope: &Marker) -> u32 {
        let partitions = self.partitions.entry(name.to_string()).or_default();
        for (index, existing) in partitions.iter_mut().enumerate() {
            if !existing.is_disjoint(scope) {
                *existing = existing.or(scope).simplify();
                return index as u32;
            }
        }
        partitions.push(scope.clone());
        (partitions.len() - 1) as u32
    }

    fn add_and_register(&mut self, incompatibility: Incompatibility) -> usize {
        // Extra re-activation can re-translate edges; don't store copies.
        if let Some((first_key, _)) = incompatibility.terms().iter().next() {
            if let Some(existing) = self.by_package.get(first_key) {
                for &idx in existing {
                    if self.incompatibilities[idx].terms() == incompatibility.terms() {
                        return idx;
                    }
                }
            }
        }
        self.incompatibilities.push(incompatibility);
        let index = self.incompatibilities.len() - 1;
        self.register(index);
        index
    }

    fn register(&mut self, index: usize) {
        let keys: Vec<PackageKey> = self.incompatibilities[index]
            .terms()
            .keys()
            .cloned()
            .collect();
        for key in keys {
            self.by_package.entry(key).or_default().push(index);
        }
    }

    fn check_budget(&mut self) -> Result<(), ResolveError> {
        if let Some(cancel) = &self.options.cancel {
            if cancel.is_cancelled() {
                tracing::debug!("resolution cancelled by caller");
                return Err(ResolveError::Cancelled);
            }
        }
        self.steps += 1;
        let over_steps = self.steps > self.options.max_steps;
        let over_time = self
            .options
            .timeout
            .is_some_and(|limit| self.started.elapsed() > limit);
        if over_steps || over_time {
            return Err(ResolveError::Timeout {
                steps: self.steps,
                elapsed_ms: self.started.elapsed().as_millis(),
            });
        }
        Ok(())
    }

    /// Assemble the ordered resolved set and dependency graph from the
    /// final decisions.
    fn build_resolution(&mut self) -> Result<Resolution, ResolveError> {
        let decisions = self.solution.decisions().clone();
        let categories = self.compute_categories(&decisions);

        let mut packages = Vec::new();
        for (key, version) in &decisions {
            if key.is_root() {
                continue;
            }
            let package = self
                .package_cache
                .get(&(key.name().to_string(), version.clone()))
                .cloned()
                .expect("decided packages are cached");
            let extras = self
                .requested_extras
                .get(key)
                .cloned()
                .unwrap_or_default();
            let metadata = self.provider.metadata(&package)?;
            let active = package
                .select_requirements(&metadata, &extras)
                .map_err(|extra| ResolveError::UnknownExtra {
                    package: key.name().to_string(),
                    extra,
                })?;
            let dependencies: Vec<DependencyRef> = active
                .iter()
                .filter(|r| match &self.options.environment {
                    Some(env) => r.marker.evaluate(env),
                    None => !r.marker.is_contradiction(),
                })
                .map(|r| DependencyRef {
                    name: r.name.clone(),
                    constraint: r.constraint.clone(),
                })
                .collect();

            packages.push(ResolvedPackage {
                name: key.name().to_string(),
                version: version.clone(),
                source: package.source().clone(),
                marker: self
                    .scopes
                    .get(key)
                    .cloned()
                    .unwrap_or(Marker::True)
                    .simplify(),
                category: categories.get(key).copied().unwrap_or(Category::Main),
                extras,
                hash: package.hash().map(str::to_string),
                dependencies,
            });
        }

        let graph = self.build_graph(&decisions, &categories);
        tracing::debug!("resolved {} packages", packages.len());
        Ok(Resolution {
            packages,
            graph,
            warnings: std::mem::take(&mut self.warnings),
        })
    }

    /// Category per package: main if reachable from a main-category root
    /// edge, dev if only reachable through dev edges.
    fn compute_categories(
        &self,
        decisions: &BTreeMap<PackageKey, Version>,
    ) -> HashMap<PackageKey, Category> {
        let mut categories: HashMap<PackageKey, Category> = HashMap::new();
        for start_category in [Category::Main, Category::Dev] {
            let mut queue: VecDeque<&PackageKey> = VecDeque::new();
            for edge in &self.edge_log {
                if !edge.from.is_root() || edge.category != start_category {
                    continue;
                }
                if decisions.contains_key(&edge.to) && !categories.contains_key(&edge.to) {
                    categories.insert(edge.to.clone(), start_category);
                    queue.push_back(&edge.to);
                }
            }
            while let Some(key) = queue.pop_front() {
                let from_version = match decisions.get(key) {
                    Some(version) => version,
                    None => continue,
                };
                for edge in &self.edge_log {
                    if &edge.from != key || &edge.from_version != from_version {
                        continue;
                    }
                    if decisions.contains_key(&edge.to) && !categories.contains_key(&edge.to) {
                        categories.insert(edge.to.clone(), start_category);
                        queue.push_back(&edge.to);
                    }
                }
            }
        }
        categories
    }

    fn build_graph(
        &self,
        decisions: &BTreeMap<PackageKey, Version>,
        categories: &HashMap<PackageKey, Category>,
    ) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        let root_idx = graph.add_node(ResolvedNode {
            name: self.root.name().to_string(),
            version: self.root.version().to_string(),
            category: Category::Main,
        });
        graph.set_root(root_idx);

        let mut nodes: HashMap<&PackageKey, petgraph::graph::NodeIndex> = HashMap::new();
        for (key, version) in decisions {
            if key.is_root() {
                continue;
            }
            let idx = graph.add_node(ResolvedNode {
                name: key.name().to_string(),
                version: version.to_string(),
                category: categories.get(key).copied().unwrap_or(Category::Main),
            });
            nodes.insert(key, idx);
        }

        for edge in &self.edge_log {
            let to_idx = match nodes.get(&edge.to) {
                Some(&idx) => idx,
                None => continue,
            };
            let from_idx = if edge.from.is_root() {
                root_idx
            } else {
                match decisions.get(&edge.from) {
                    Some(version) if *version == edge.from_version => {
                        match nodes.get(&edge.from) {
                            Some(&idx) => idx,
                            None => continue,
                        }
                    }
                    _ => continue,
                }
            };
            graph.add_edge(
                from_idx,
                to_idx,
                DepEdge {
                    category: edge.category,
                    optional: edge.optional,
                },
            );
        }

        graph
    }
}

fn merge_term(terms: &mut BTreeMap<PackageKey, Term>, key: PackageKey, term: Term) {
    terms
        .entry(key)
        .and_modify(|existing| *existing = existing.intersect(&term))
        .or_insert(term);
}
