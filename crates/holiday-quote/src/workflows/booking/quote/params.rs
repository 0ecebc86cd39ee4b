use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::booking::domain::{Apartment, ApartmentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChildGuest {
    #[serde(default)]
    pub under_twelve: bool,
    #[serde(default)]
    pub sleeps_with_parents: bool,
    #[serde(default)]
    pub sleeps_in_crib: bool,
}

impl ChildGuest {
    pub fn needs_bed(&self) -> bool {
        !self.sleeps_with_parents && !self.sleeps_in_crib
    }

    pub fn pays_tourist_tax(&self) -> bool {
        !self.under_twelve
    }
}

/// Guests assigned to one apartment when the party spans several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupantSplit {
    pub adults: u32,
    #[serde(default)]
    pub children_needing_bed: u32,
}

impl OccupantSplit {
    pub fn beds(&self) -> u32 {
        self.adults + self.children_needing_bed
    }
}

/// Everything the calculator needs to price a stay.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteParams {
    #[serde(default)]
    pub apartments: Vec<ApartmentId>,
    #[serde(default)]
    pub checkin: Option<NaiveDate>,
    #[serde(default)]
    pub checkout: Option<NaiveDate>,
    pub adults: u32,
    #[serde(default)]
    pub children: Vec<ChildGuest>,
    #[serde(default)]
    pub has_pet: bool,
    #[serde(default)]
    pub pet_assignment: Option<BTreeMap<ApartmentId, bool>>,
    #[serde(default)]
    pub linen_requested: bool,
    #[serde(default)]
    pub occupancy: Option<BTreeMap<ApartmentId, OccupantSplit>>,
}

impl QuoteParams {
    /// Copy with repeated apartment ids removed, keeping first-seen order.
    pub fn with_distinct_apartments(&self) -> Self {
        let mut seen = HashSet::new();
        Self {
            apartments: self
                .apartments
                .iter()
                .filter(|id| seen.insert(*id))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Adults plus children who need a bed of their own.
    pub fn bed_guests(&self) -> u32 {
        self.adults + self.children.iter().filter(|child| child.needs_bed()).count() as u32
    }

    pub fn tourist_tax_guests(&self) -> u32 {
        self.adults
            + self
                .children
                .iter()
                .filter(|child| child.pays_tourist_tax())
                .count() as u32
    }

    /// Persons receiving a linen set, from the distribution when one is given.
    pub fn linen_guests(&self) -> u32 {
        match &self.occupancy {
            Some(split) => self
                .apartments
                .iter()
                .filter_map(|id| split.get(id))
                .map(OccupantSplit::beds)
                .sum(),
            None => self.bed_guests(),
        }
    }

    pub fn pets_charged(&self) -> u32 {
        if !self.has_pet {
            return 0;
        }
        match &self.pet_assignment {
            Some(assignment) => self
                .apartments
                .iter()
                .filter(|id| assignment.get(*id).copied().unwrap_or(false))
                .count() as u32,
            None => 1,
        }
    }
}

/// Occupied beds per priced apartment.
///
/// An explicit distribution is used as given. Without one, bed guests fill the
/// apartments in selection order up to each apartment's bed count, and any
/// overflow lands in the last apartment.
pub fn allocate_beds(params: &QuoteParams, apartments: &[Apartment]) -> BTreeMap<ApartmentId, u32> {
    if let Some(split) = &params.occupancy {
        return apartments
            .iter()
            .map(|apartment| {
                let beds = split.get(&apartment.id).map(OccupantSplit::beds).unwrap_or(0);
                (apartment.id.clone(), beds)
            })
            .collect();
    }

    let mut remaining = params.bed_guests();
    let mut allocation = BTreeMap::new();
    for (index, apartment) in apartments.iter().enumerate() {
        let taken = if index + 1 == apartments.len() {
            remaining
        } else {
            remaining.min(apartment.beds)
        };
        remaining -= taken;
        allocation.insert(apartment.id.clone(), taken);
    }
    allocation
}
