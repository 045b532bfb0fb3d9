/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::cost::{Carder, Coster};
use super::errors::{CostError, CostResult};
use super::operators::RelExpr;
use super::stats::StatsProvider;
use log::{debug, trace, warn};
use rayon::prelude::*;
use shared::{FuncDepSet, TableId};
use std::fmt::{self, Write};

/// Handle of a group inside a `Memo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical properties shared by every member of a group
#[derive(Debug, Clone, PartialEq)]
pub struct RelProps {
    /// Estimated row count
    pub card: f64,
    pub fds: FuncDepSet,
}

impl Default for RelProps {
    fn default() -> Self {
        Self {
            card: 1.0,
            fds: FuncDepSet::default(),
        }
    }
}

/// A set of logically equivalent physical alternatives
#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    members: Vec<RelExpr>,
    props: RelProps,
    best: Option<usize>,
    cost: f64,
    done: bool,
}

impl Group {
    fn new(id: GroupId) -> Self {
        Self {
            id,
            members: Vec::new(),
            props: RelProps::default(),
            best: None,
            cost: 0.0,
            done: false,
        }
    }

    pub fn members(&self) -> &[RelExpr] {
        &self.members
    }

    pub fn props(&self) -> &RelProps {
        &self.props
    }

    /// Cheapest member found by the last search, if any
    pub fn best(&self) -> Option<&RelExpr> {
        self.best.and_then(|i| self.members.get(i))
    }

    /// Total cost of the best member, including its inputs
    pub fn cost(&self) -> Option<f64> {
        if self.done {
            Some(self.cost)
        } else {
            None
        }
    }
}

/// Arena of plan groups.
///
/// Members reference their inputs by `GroupId`, and a member may only read
/// from groups created before its own, so the memo is acyclic and a single
/// pass in id order visits every input before its consumers.
#[derive(Debug, Clone, Default)]
pub struct Memo {
    groups: Vec<Group>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty group and returns its handle
    pub fn new_group(&mut self) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(Group::new(id));
        id
    }

    /// Creates a group holding a single table scan
    pub fn add_scan(&mut self, database: &str, table: &str, table_id: TableId) -> GroupId {
        let id = self.new_group();
        self.groups[id.0]
            .members
            .push(RelExpr::table_scan(database, table, table_id));
        id
    }

    /// Adds a physical alternative to a group. A join's own group field is
    /// rewritten to the group it is added to.
    ///
    /// The search results of the group and of every later group are
    /// dropped, since only later groups can consume it.
    pub fn add_member(&mut self, group: GroupId, mut rel: RelExpr) -> CostResult<()> {
        if group.0 >= self.groups.len() {
            return Err(CostError::UnknownGroup(group));
        }
        for child in rel.children() {
            if child.0 >= group.0 {
                return Err(CostError::InvalidChild { group, child });
            }
        }
        if let Some(base) = rel.join_base_mut() {
            base.group = group;
        }
        self.groups[group.0].members.push(rel);
        for stale in &mut self.groups[group.0..] {
            stale.best = None;
            stale.cost = 0.0;
            stale.done = false;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, id: GroupId) -> CostResult<&Group> {
        self.groups.get(id.0).ok_or(CostError::UnknownGroup(id))
    }

    pub fn props(&self, id: GroupId) -> CostResult<&RelProps> {
        self.group(id).map(|g| &g.props)
    }

    /// Cached row count estimate of a group
    pub fn card(&self, id: GroupId) -> CostResult<f64> {
        self.group(id).map(|g| g.props.card)
    }

    pub fn fds(&self, id: GroupId) -> CostResult<&FuncDepSet> {
        self.group(id).map(|g| &g.props.fds)
    }

    pub fn set_props(&mut self, id: GroupId, props: RelProps) -> CostResult<()> {
        let group = self.groups.get_mut(id.0).ok_or(CostError::UnknownGroup(id))?;
        group.props = props;
        Ok(())
    }

    pub fn set_card(&mut self, id: GroupId, card: f64) -> CostResult<()> {
        let group = self.groups.get_mut(id.0).ok_or(CostError::UnknownGroup(id))?;
        group.props.card = card;
        Ok(())
    }

    pub fn set_fds(&mut self, id: GroupId, fds: FuncDepSet) -> CostResult<()> {
        let group = self.groups.get_mut(id.0).ok_or(CostError::UnknownGroup(id))?;
        group.props.fds = fds;
        Ok(())
    }

    /// Table scanned by a group, when the group is a base table
    pub fn table_id(&self, id: GroupId) -> Option<TableId> {
        self.groups.get(id.0)?.members.iter().find_map(|m| match m {
            RelExpr::TableScan { table_id, .. } => Some(*table_id),
            _ => None,
        })
    }

    /// Groups reachable from `root`, in ascending id order
    fn reachable(&self, root: GroupId) -> CostResult<Vec<GroupId>> {
        self.group(root)?;
        let mut seen = vec![false; self.groups.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if seen[id.0] {
                continue;
            }
            seen[id.0] = true;
            for member in &self.groups[id.0].members {
                stack.extend(member.children());
            }
        }
        Ok(seen
            .iter()
            .enumerate()
            .filter(|(_, reached)| **reached)
            .map(|(i, _)| GroupId(i))
            .collect())
    }

    /// Derives the row count of every group reachable from `root` from
    /// its first member
    pub fn estimate_cardinalities(
        &mut self,
        root: GroupId,
        carder: &Carder,
        stats: &dyn StatsProvider,
    ) -> CostResult<()> {
        for id in self.reachable(root)? {
            let member = self.groups[id.0]
                .members
                .first()
                .ok_or(CostError::EmptyGroup(id))?;
            let card = carder.estimate(self, member, stats)?;
            trace!("group {} estimated at {:.2} rows", id, card);
            self.groups[id.0].props.card = card;
        }
        Ok(())
    }

    /// Picks the cheapest member of every group reachable from `root` and
    /// returns the total cost of the root.
    ///
    /// Members of one group are priced in parallel. A member whose costing
    /// fails is discarded; a group fails only when all its members do.
    pub fn optimize(
        &mut self,
        root: GroupId,
        coster: &dyn Coster,
        stats: &dyn StatsProvider,
    ) -> CostResult<f64> {
        for id in self.reachable(root)? {
            if self.groups[id.0].done {
                continue;
            }
            let (best, cost) = self.search_group(id, coster, stats)?;
            let group = &mut self.groups[id.0];
            group.best = Some(best);
            group.cost = cost;
            group.done = true;
            debug!(
                "group {} best plan {} at cost {:.4}",
                id, group.members[best], cost
            );
        }
        self.groups[root.0]
            .cost()
            .ok_or(CostError::EmptyGroup(root))
    }

    fn search_group(
        &self,
        id: GroupId,
        coster: &dyn Coster,
        stats: &dyn StatsProvider,
    ) -> CostResult<(usize, f64)> {
        let group = &self.groups[id.0];
        if group.members.is_empty() {
            return Err(CostError::EmptyGroup(id));
        }

        let costs: Vec<CostResult<f64>> = group
            .members
            .par_iter()
            .map(|member| self.total_cost(member, coster, stats))
            .collect();

        let mut best: Option<(usize, f64)> = None;
        let mut first_err = None;
        for (i, result) in costs.into_iter().enumerate() {
            match result {
                Ok(cost) => {
                    trace!("group {} candidate {} costs {:.4}", id, group.members[i], cost);
                    if best.map_or(true, |(_, c)| cost < c) {
                        best = Some((i, cost));
                    }
                }
                Err(err) => {
                    warn!("discarding candidate {} in group {}: {}", group.members[i], id, err);
                    first_err.get_or_insert(err);
                }
            }
        }

        match (best, first_err) {
            (Some(best), _) => Ok(best),
            (None, Some(err)) => Err(CostError::NoViablePlan {
                group: id,
                source: Box::new(err),
            }),
            (None, None) => Err(CostError::EmptyGroup(id)),
        }
    }

    fn total_cost(
        &self,
        member: &RelExpr,
        coster: &dyn Coster,
        stats: &dyn StatsProvider,
    ) -> CostResult<f64> {
        let mut total = coster.estimate_cost(self, member, stats)?;
        for child in member.children() {
            let group = self.group(child)?;
            total += group.cost().ok_or(CostError::EmptyGroup(child))?;
        }
        Ok(total)
    }

    /// Forgets every search result so another coster can run over the
    /// same groups. Costs of different passes are not comparable.
    pub fn reset_search(&mut self) {
        for group in &mut self.groups {
            group.best = None;
            group.cost = 0.0;
            group.done = false;
        }
    }

    /// Best member of a group, once `optimize` has reached it
    pub fn best_plan(&self, id: GroupId) -> Option<&RelExpr> {
        self.groups.get(id.0)?.best()
    }

    /// Renders the chosen plan below `root` as an indented tree
    pub fn explain(&self, root: GroupId) -> String {
        let mut out = String::new();
        self.explain_group(root, 0, &mut out);
        out
    }

    fn explain_group(&self, id: GroupId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let Some(group) = self.groups.get(id.0) else {
            let _ = writeln!(out, "{}#{} <unknown>", indent, id);
            return;
        };
        match group.best() {
            Some(best) => {
                let _ = writeln!(
                    out,
                    "{}{} rows={:.1} cost={:.4}",
                    indent, best, group.props.card, group.cost
                );
                for child in best.children() {
                    self.explain_group(child, depth + 1, out);
                }
            }
            None => {
                let _ = writeln!(out, "{}#{} <not optimized>", indent, id);
            }
        }
    }
}
