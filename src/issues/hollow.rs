//! Resin-trap connectivity grouping.
//!
//! Hollow areas found independently on each layer are joined into
//! [`TrapGroup`]s as the stack is scanned from one end to the other. Two
//! areas on consecutive layers that an external overlap test deems connected
//! end up in the same group. As soon as any member drains (has an escape
//! path for resin) the whole group drains.
//!
//! Areas live in an arena owned by the [`TrapConnectivityTree`] and are
//! addressed by [`HollowAreaId`]; group membership is a handle comparison,
//! never an identity or value comparison.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::{Polygon, Rect, contours_area, contours_bounding_rect};
use crate::layer_error::LayerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable handle of a hollow area inside one tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HollowAreaId(usize);

impl HollowAreaId {
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Handle of a trap group. Merging retires both source ids and issues a new one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(u64);

impl GroupId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Classification of a hollow area.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HollowAreaKind {
    #[default]
    Unknown,
    /// Enclosed: resin cannot escape.
    Trap,
    /// Has an escape path.
    Drain,
}

/// One per-layer candidate cavity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HollowArea {
    layer_index: u32,
    contours: Vec<Polygon>,
    bounding_rect: Rect,
    area: f64,
    kind: HollowAreaKind,
    processed: bool,
}

impl HollowArea {
    /// Builds an area from its contours, deriving bounds and area.
    pub fn new(layer_index: u32, contours: Vec<Polygon>, kind: HollowAreaKind) -> Self {
        let bounding_rect = contours_bounding_rect(&contours);
        let area = contours_area(&contours);
        Self::with_bounds(layer_index, contours, bounding_rect, area, kind)
    }

    /// Builds an area with bounds already measured by the detector.
    pub fn with_bounds(
        layer_index: u32,
        contours: Vec<Polygon>,
        bounding_rect: Rect,
        area: f64,
        kind: HollowAreaKind,
    ) -> Self {
        Self {
            layer_index,
            contours,
            bounding_rect,
            area,
            kind,
            processed: false,
        }
    }

    #[inline]
    pub fn layer_index(&self) -> u32 {
        self.layer_index
    }

    #[inline]
    pub fn contours(&self) -> &[Polygon] {
        &self.contours
    }

    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.bounding_rect
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    #[inline]
    pub fn kind(&self) -> HollowAreaKind {
        self.kind
    }

    #[inline]
    pub fn is_processed(&self) -> bool {
        self.processed
    }
}

/// A set of connected hollow areas sharing one kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrapGroup {
    id: GroupId,
    members: Vec<HollowAreaId>,
    kind: HollowAreaKind,
}

impl TrapGroup {
    fn new(id: GroupId) -> Self {
        Self {
            id,
            members: Vec::new(),
            kind: HollowAreaKind::Trap,
        }
    }

    #[inline]
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Members in insertion order.
    #[inline]
    pub fn members(&self) -> &[HollowAreaId] {
        &self.members
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    pub fn contains(&self, area: HollowAreaId) -> bool {
        self.members.contains(&area)
    }

    #[inline]
    pub fn kind(&self) -> HollowAreaKind {
        self.kind
    }

    #[inline]
    pub fn is_drain(&self) -> bool {
        self.kind == HollowAreaKind::Drain
    }

    #[inline]
    pub fn is_trap(&self) -> bool {
        self.kind == HollowAreaKind::Trap
    }
}

/// Incremental connected-components over hollow areas.
#[derive(Clone, Debug, Default)]
pub struct TrapConnectivityTree {
    areas: Vec<HollowArea>,
    groups: Vec<TrapGroup>,
    next_group: u64,
}

impl TrapConnectivityTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `area` into the arena and returns its handle.
    pub fn insert_area(&mut self, area: HollowArea) -> HollowAreaId {
        self.areas.push(area);
        HollowAreaId(self.areas.len() - 1)
    }

    pub fn area(&self, id: HollowAreaId) -> Option<&HollowArea> {
        self.areas.get(id.0)
    }

    pub fn areas(&self) -> impl Iterator<Item = (HollowAreaId, &HollowArea)> + '_ {
        self.areas.iter().enumerate().map(|(i, a)| (HollowAreaId(i), a))
    }

    #[inline]
    pub fn groups(&self) -> &[TrapGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&TrapGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Group currently holding `area`, by linear scan.
    pub fn find_group(&self, area: HollowAreaId) -> Option<GroupId> {
        self.find_group_index(area).map(|i| self.groups[i].id)
    }

    /// Position in [`groups`](Self::groups) of the group holding `area`.
    pub fn find_group_index(&self, area: HollowAreaId) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(area))
    }

    fn check_area(&self, area: HollowAreaId) -> Result<(), LayerError> {
        if area.0 < self.areas.len() {
            Ok(())
        } else {
            Err(LayerError::UnknownHollowArea(area.0))
        }
    }

    fn group_index(&self, id: GroupId) -> Result<usize, LayerError> {
        self.groups
            .iter()
            .position(|g| g.id == id)
            .ok_or(LayerError::UnknownTrapGroup(id.0))
    }

    fn next_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    /// Sets a group's kind and mirrors it onto every member.
    fn set_group_kind(&mut self, index: usize, kind: HollowAreaKind) {
        let group = &mut self.groups[index];
        group.kind = kind;
        for member in &group.members {
            self.areas[member.0].kind = kind;
        }
    }

    /// Appends `area` to the group at `index`, applying the drain rule in
    /// both directions.
    fn join(&mut self, index: usize, area: HollowAreaId) {
        self.groups[index].members.push(area);
        if self.areas[area.0].kind == HollowAreaKind::Drain {
            if !self.groups[index].is_drain() {
                self.set_group_kind(index, HollowAreaKind::Drain);
            }
        } else {
            self.areas[area.0].kind = self.groups[index].kind;
        }
    }

    /// Places `area` in a group: its existing one if any, else a new singleton.
    /// Returns the group and its position in [`groups`](Self::groups).
    pub fn add_root(&mut self, area: HollowAreaId) -> Result<(GroupId, usize), LayerError> {
        self.check_area(area)?;
        if let Some(index) = self.find_group_index(area) {
            return Ok((self.groups[index].id, index));
        }
        let id = self.next_group_id();
        self.groups.push(TrapGroup::new(id));
        let index = self.groups.len() - 1;
        self.join(index, area);
        crate::debug_invariants!(self.validate_invariants(), "TrapConnectivityTree::add_root");
        Ok((id, index))
    }

    /// Connects `area` to `group`.
    ///
    /// - `area` in no group: it joins `group`.
    /// - `area` already in `group`: no-op.
    /// - `area` in another group: both groups are replaced by their union,
    ///   whose new id is returned.
    pub fn add_child(&mut self, group: GroupId, area: HollowAreaId) -> Result<GroupId, LayerError> {
        self.check_area(area)?;
        let index = self.group_index(group)?;
        let result = match self.find_group(area) {
            None => {
                self.join(index, area);
                group
            }
            Some(owner) if owner == group => group,
            Some(owner) => self.merge_groups(group, owner, true)?.id(),
        };
        crate::debug_invariants!(self.validate_invariants(), "TrapConnectivityTree::add_child");
        Ok(result)
    }

    /// Builds the union of groups `a` and `b` (members of `a` first) under a
    /// fresh id. Drain wins over trap.
    ///
    /// With `manage` the two originals are removed and the union is inserted
    /// into the tree; without it the tree is left as is and the union is only
    /// returned.
    pub fn merge_groups(&mut self, a: GroupId, b: GroupId, manage: bool) -> Result<TrapGroup, LayerError> {
        let ia = self.group_index(a)?;
        let ib = self.group_index(b)?;
        let mut merged = TrapGroup::new(self.next_group_id());
        merged.members.extend(&self.groups[ia].members);
        if ia != ib {
            merged.members.extend(&self.groups[ib].members);
        }
        if self.groups[ia].is_drain() || self.groups[ib].is_drain() {
            merged.kind = HollowAreaKind::Drain;
        }
        if !manage {
            return Ok(merged);
        }

        self.groups.retain(|g| g.id != a && g.id != b);
        self.groups.push(merged);
        let index = self.groups.len() - 1;
        let kind = self.groups[index].kind;
        self.set_group_kind(index, kind);
        log::debug!(
            "merged trap groups {} + {} -> {} ({} areas, {:?})",
            a.0,
            b.0,
            self.groups[index].id.0,
            self.groups[index].len(),
            kind
        );
        crate::debug_invariants!(self.validate_invariants(), "TrapConnectivityTree::merge_groups");
        Ok(self.groups[index].clone())
    }

    /// Classifies `area`. While it belongs to a group the write goes through
    /// the group: `Drain` drains the whole group, and a drained group never
    /// reverts to `Trap`.
    pub fn set_area_kind(&mut self, area: HollowAreaId, kind: HollowAreaKind) -> Result<(), LayerError> {
        self.check_area(area)?;
        match self.find_group_index(area) {
            Some(index) => {
                if kind == HollowAreaKind::Drain && !self.groups[index].is_drain() {
                    self.set_group_kind(index, HollowAreaKind::Drain);
                }
            }
            None => self.areas[area.0].kind = kind,
        }
        crate::debug_invariants!(self.validate_invariants(), "TrapConnectivityTree::set_area_kind");
        Ok(())
    }

    /// Kind of `area`, as seen through its group when it has one.
    pub fn area_kind(&self, area: HollowAreaId) -> Option<HollowAreaKind> {
        match self.find_group_index(area) {
            Some(index) => Some(self.groups[index].kind),
            None => self.area(area).map(HollowArea::kind),
        }
    }

    /// Detaches `area` from its group. A group left empty is reset to `Trap`
    /// and dropped from the tree. Returns whether `area` was in a group.
    pub fn remove_area(&mut self, area: HollowAreaId) -> Result<bool, LayerError> {
        self.check_area(area)?;
        let Some(index) = self.find_group_index(area) else {
            return Ok(false);
        };
        let group = &mut self.groups[index];
        group.members.retain(|&m| m != area);
        if group.members.is_empty() {
            group.kind = HollowAreaKind::Trap;
            self.groups.remove(index);
        }
        crate::debug_invariants!(self.validate_invariants(), "TrapConnectivityTree::remove_area");
        Ok(true)
    }

    /// Flags `area` as consumed by the grouping pass.
    pub fn mark_processed(&mut self, area: HollowAreaId) -> Result<(), LayerError> {
        self.check_area(area)?;
        self.areas[area.0].processed = true;
        Ok(())
    }
}

impl DebugInvariants for TrapConnectivityTree {
    fn validate_invariants(&self) -> Result<(), LayerError> {
        let mut seen = HashSet::new();
        let mut ids = HashSet::new();
        for group in &self.groups {
            if !ids.insert(group.id) {
                return Err(LayerError::InvariantViolation(format!(
                    "trap group id {} appears twice",
                    group.id.0
                )));
            }
            if group.members.is_empty() {
                return Err(LayerError::InvariantViolation(format!(
                    "trap group {} is empty",
                    group.id.0
                )));
            }
            for &member in &group.members {
                self.check_area(member)?;
                if !seen.insert(member) {
                    return Err(LayerError::InvariantViolation(format!(
                        "hollow area {} belongs to more than one group",
                        member.0
                    )));
                }
                if self.areas[member.0].kind != group.kind {
                    return Err(LayerError::InvariantViolation(format!(
                        "hollow area {} kind differs from its group {}",
                        member.0, group.id.0
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn square(layer: u32, x: i32) -> HollowArea {
        HollowArea::new(
            layer,
            vec![Polygon::new(vec![
                Point::new(x, 0),
                Point::new(x + 4, 0),
                Point::new(x + 4, 4),
                Point::new(x, 4),
            ])],
            HollowAreaKind::Unknown,
        )
    }

    #[test]
    fn add_root_reuses_existing_group() {
        let mut tree = TrapConnectivityTree::new();
        let a = tree.insert_area(square(0, 0));
        let (g, i) = tree.add_root(a).unwrap();
        assert_eq!(i, 0);
        assert_eq!(tree.add_root(a).unwrap(), (g, 0));
        assert_eq!(tree.groups().len(), 1);
        assert_eq!(tree.area_kind(a), Some(HollowAreaKind::Trap));
    }

    #[test]
    fn add_child_cases() {
        let mut tree = TrapConnectivityTree::new();
        let a = tree.insert_area(square(2, 0));
        let b = tree.insert_area(square(1, 0));
        let c = tree.insert_area(square(1, 10));
        let (ga, _) = tree.add_root(a).unwrap();
        assert_eq!(tree.add_child(ga, b).unwrap(), ga);
        assert_eq!(tree.add_child(ga, b).unwrap(), ga);

        let (gc, _) = tree.add_root(c).unwrap();
        let merged = tree.add_child(ga, c).unwrap();
        assert_ne!(merged, ga);
        assert_ne!(merged, gc);
        assert_eq!(tree.groups().len(), 1);
        assert_eq!(tree.group(merged).unwrap().members(), &[a, b, c]);
        assert!(matches!(tree.add_child(ga, c), Err(LayerError::UnknownTrapGroup(_))));
    }

    #[test]
    fn drain_joining_drains_the_group() {
        let mut tree = TrapConnectivityTree::new();
        let a = tree.insert_area(square(1, 0));
        let mut drain = square(0, 0);
        drain.kind = HollowAreaKind::Drain;
        let b = tree.insert_area(drain);
        let (g, _) = tree.add_root(a).unwrap();
        tree.add_child(g, b).unwrap();
        assert!(tree.group(g).unwrap().is_drain());
        assert_eq!(tree.area(a).unwrap().kind(), HollowAreaKind::Drain);
        tree.set_area_kind(a, HollowAreaKind::Trap).unwrap();
        assert_eq!(tree.area_kind(a), Some(HollowAreaKind::Drain));
    }

    #[test]
    fn unmanaged_merge_leaves_tree_untouched() {
        let mut tree = TrapConnectivityTree::new();
        let a = tree.insert_area(square(1, 0));
        let b = tree.insert_area(square(0, 0));
        let (ga, _) = tree.add_root(a).unwrap();
        let (gb, _) = tree.add_root(b).unwrap();
        let preview = tree.merge_groups(ga, gb, false).unwrap();
        assert_eq!(preview.members(), &[a, b]);
        assert!(tree.group(preview.id()).is_none());
        assert_eq!(tree.groups().len(), 2);
        assert!(tree.group(ga).is_some() && tree.group(gb).is_some());
    }

    #[test]
    fn removing_last_member_drops_group() {
        let mut tree = TrapConnectivityTree::new();
        let a = tree.insert_area(square(0, 0));
        tree.add_root(a).unwrap();
        assert!(tree.remove_area(a).unwrap());
        assert!(tree.groups().is_empty());
        assert!(!tree.remove_area(a).unwrap());
        assert!(matches!(
            tree.remove_area(HollowAreaId(9)),
            Err(LayerError::UnknownHollowArea(9))
        ));
    }

    #[test]
    fn removing_from_a_drained_group_keeps_the_tree_consistent() {
        let mut tree = TrapConnectivityTree::new();
        let a = tree.insert_area(square(2, 0));
        let b = tree.insert_area(square(1, 0));
        let c = tree.insert_area(square(0, 0));
        let (g, _) = tree.add_root(a).unwrap();
        tree.add_child(g, b).unwrap();
        tree.add_child(g, c).unwrap();
        tree.set_area_kind(c, HollowAreaKind::Drain).unwrap();

        assert!(tree.remove_area(b).unwrap());
        tree.validate_invariants().unwrap();
        let group = tree.group(g).unwrap();
        assert_eq!(group.members(), &[a, c]);
        assert!(group.is_drain());
        assert_eq!(tree.find_group(b), None);

        assert!(tree.remove_area(a).unwrap());
        assert!(tree.remove_area(c).unwrap());
        tree.validate_invariants().unwrap();
        assert!(tree.groups().is_empty());
    }
}
