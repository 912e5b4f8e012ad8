use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};

use crate::common::Message;

/// Messages sent on one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup<'a> {
    pub day: NaiveDate,
    pub messages: Vec<&'a Message>,
}

impl DayGroup<'_> {
    pub fn label(&self) -> String {
        self.day.format("%a %b %d %Y").to_string()
    }
}

/// Group `messages` by calendar day in `zone`, days ascending.
///
/// Within a day the input order is kept, so a list in arrival order stays in
/// arrival order.
pub fn group_by_day<'a, Tz: TimeZone>(messages: &'a [Message], zone: &Tz) -> Vec<DayGroup<'a>> {
    let mut days: BTreeMap<NaiveDate, Vec<&'a Message>> = BTreeMap::new();
    for message in messages {
        let day = message.created_at.with_timezone(zone).date_naive();
        days.entry(day).or_default().push(message);
    }

    days.into_iter()
        .map(|(day, messages)| DayGroup { day, messages })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};

    use super::*;
    use crate::session::conversation::tests::message;

    fn at(id: &str, day: u32, hour: u32) -> Message {
        let mut m = message(id, "p", "me", id);
        m.created_at = Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap();
        m
    }

    #[test]
    fn groups_ascend_by_day_and_keep_member_order() {
        let messages = vec![at("c", 3, 9), at("a", 1, 12), at("d", 3, 8), at("b", 1, 7)];
        let groups = group_by_day(&messages, &Utc);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].day, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let first: Vec<_> = groups[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(first, vec!["a", "b"]);
        let second: Vec<_> = groups[1].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(second, vec!["c", "d"]);
        assert_eq!(groups[0].label(), "Wed May 01 2024");
    }

    #[test]
    fn regrouping_is_stable() {
        let messages = vec![at("x", 2, 23), at("y", 2, 1), at("z", 4, 5)];
        let once = group_by_day(&messages, &Utc);
        let twice = group_by_day(&messages, &Utc);
        assert_eq!(once, twice);
    }

    #[test]
    fn day_boundary_follows_zone() {
        let messages = vec![at("late", 1, 20)];
        let hanoi = FixedOffset::east_opt(7 * 3600).unwrap();
        let groups = group_by_day(&messages, &hanoi);
        assert_eq!(groups[0].day, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    }
}
