use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::Serialize;

use crate::{Error, ModuleSlot, Result, TimeInterval, Weekday};

/// 周课表：周一至周五，每天若干节课
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyTimetable {
    days: BTreeMap<Weekday, Vec<ModuleSlot>>,
}

impl WeeklyTimetable {
    /// Build from per-day slots; every teaching day must be present.
    pub fn new(days: BTreeMap<Weekday, Vec<ModuleSlot>>) -> Result<Self> {
        let timetable = Self { days };
        timetable.validate()?;
        Ok(timetable)
    }

    /// 从JSON字符串加载课表
    pub fn from_json(json_data: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(json_data)?;

        let mut days = BTreeMap::new();
        for (key, values) in raw {
            let day = Weekday::from_name(&key).ok_or_else(|| {
                Error::InvalidTimetableShape(format!("unknown weekday key '{key}'"))
            })?;
            let slots = values
                .into_iter()
                .map(parse_slot)
                .collect::<Result<Vec<_>>>()?;
            days.insert(day, slots);
        }

        let timetable = Self::new(days)?;
        tracing::debug!(
            "Loaded timetable with {} slots across {} modules",
            timetable.slot_count(),
            timetable.module_names().len()
        );
        Ok(timetable)
    }

    /// 从文件加载课表
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading timetable from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check weekday completeness and week numbers.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = Weekday::ALL
            .iter()
            .filter(|day| !self.days.contains_key(*day))
            .map(|day| day.name())
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidTimetableShape(format!(
                "missing weekday(s): {}",
                missing.join(", ")
            )));
        }

        for (day, slot) in self.iter() {
            if slot.week == 0 {
                return Err(Error::InvalidTimetableShape(format!(
                    "slot '{}' on {} has week 0; weeks start at 1",
                    slot.id, day
                )));
            }
        }

        Ok(())
    }

    pub fn slots(&self, day: Weekday) -> &[ModuleSlot] {
        self.days
            .get(&day)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Slots in week order, Monday first, insertion order within a day.
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &ModuleSlot)> {
        self.days
            .iter()
            .flat_map(|(day, slots)| slots.iter().map(move |slot| (*day, slot)))
    }

    pub fn slot_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    /// 可选课程列表（去重、排序）
    pub fn module_names(&self) -> Vec<String> {
        self.iter()
            .map(|(_, slot)| slot.module.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// 时间段先单独校验，其余字段交给 serde
fn parse_slot(value: serde_json::Value) -> Result<ModuleSlot> {
    if let Some(time) = value.get("time") {
        TimeInterval::from_json_value(time)?;
    }
    Ok(serde_json::from_value(value)?)
}
