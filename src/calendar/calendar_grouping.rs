//! Folds meeting rows into one group per meeting occurrence.

use crate::calendar::calendar_import::{handle_bad_row, ImportError};
use crate::calendar::calendar_types::{
    Attendee, BadRowPolicy, ConflictPolicy, GroupBy, GroupKey, MeetingDetails, MeetingGroup, MeetingRow,
};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupingOptions {
    pub group_by: GroupBy,
    pub on_conflict: ConflictPolicy,
    pub on_bad_row: BadRowPolicy,
}

/// Compute the group key for a meeting's schedule.
pub fn group_key(details: &MeetingDetails, group_by: GroupBy) -> GroupKey {
    let fields = match group_by {
        GroupBy::Schedule => vec![
            details.start_date.format("%Y-%m-%d").to_string(),
            details.start_time.format("%H:%M").to_string(),
            details.end_date.format("%Y-%m-%d").to_string(),
            details.end_time.format("%H:%M").to_string(),
        ],
        GroupBy::Date => vec![details.start_date.format("%Y-%m-%d").to_string()],
    };

    let joined = fields.join(&KEY_SEPARATOR.to_string());
    GroupKey::from_hex(format!("{:x}", Sha256::digest(joined.as_bytes())))
}

/// Groups in first-seen order, addressable by key.
#[derive(Debug, Default, Clone)]
pub struct MeetingGroups {
    groups: Vec<MeetingGroup>,
    index: HashMap<GroupKey, usize>,
}

impl MeetingGroups {
    pub fn iter(&self) -> std::slice::Iter<'_, MeetingGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn insert(&mut self, group: MeetingGroup) {
        self.index.insert(group.key.clone(), self.groups.len());
        self.groups.push(group);
    }

    fn get_mut(&mut self, key: &GroupKey) -> Option<&mut MeetingGroup> {
        match self.index.get(key) {
            Some(&i) => self.groups.get_mut(i),
            None => None,
        }
    }
}

impl<'a> IntoIterator for &'a MeetingGroups {
    type Item = &'a MeetingGroup;
    type IntoIter = std::slice::Iter<'a, MeetingGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

fn push_unique(list: &mut Vec<Attendee>, attendee: Attendee) {
    if !list.iter().any(|existing| existing.same_address(&attendee)) {
        list.push(attendee);
    }
}

/// Group rows by meeting occurrence.
///
/// The first row seen for a key supplies the group's scalar fields; later rows
/// only contribute attendees. Attendee lists keep first-seen order and never
/// hold the same address twice.
pub fn group_rows<I>(rows: I, options: &GroupingOptions) -> Result<MeetingGroups, ImportError>
where
    I: IntoIterator<Item = MeetingRow>,
{
    let mut groups = MeetingGroups::default();

    for row in rows {
        let key = group_key(&row.details, options.group_by);

        let Some(group) = groups.get_mut(&key) else {
            debug!("New meeting group {} for '{}' (line {})", &key.as_str()[..12], row.details.subject, row.line);
            groups.insert(MeetingGroup {
                key,
                required: vec![row.recipient],
                optional: row.cc.into_iter().collect(),
                details: row.details,
            });
            continue;
        };

        if let Some(field) = group.details.first_difference(&row.details) {
            match options.on_conflict {
                ConflictPolicy::FirstWins => {
                    warn!(
                        "Line {}: {} differs from the first row of '{}'; keeping the first value",
                        row.line, field, group.details.subject
                    );
                }
                ConflictPolicy::Reject => {
                    let err = ImportError::InvalidRow {
                        line: row.line,
                        reason: format!("{} conflicts with an earlier row for the same meeting", field),
                    };
                    handle_bad_row(err, options.on_bad_row)?;
                    continue;
                }
            }
        }

        push_unique(&mut group.required, row.recipient);
        if let Some(cc) = row.cc {
            push_unique(&mut group.optional, cc);
        }
    }

    Ok(groups)
}
