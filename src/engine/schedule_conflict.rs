// ==========================================
// 选课席位分配系统 - 课时冲突判定
// ==========================================
// 职责: 两个周课时段的重叠判定（纯函数）
// 规则: 同一星期且 [start, end) 分钟区间相交 => 冲突
//       即 not (endA <= startB or endB <= startA)
// 红线: 时间格式错误立即报错,不得静默忽略
// ==========================================

use crate::domain::course::Session;
use crate::engine::error::{EngineError, EngineResult};

// ==========================================
// ScheduleConflict - 课时冲突判定
// ==========================================
pub struct ScheduleConflict {
    // 无状态引擎
}

impl ScheduleConflict {
    pub fn new() -> Self {
        Self {}
    }

    /// 解析 "HH:MM" 为当日分钟数
    ///
    /// # 返回
    /// - Ok(u32): 0..=1439
    /// - Err(InvalidTimeFormat): 格式错误或越界
    pub fn parse_hhmm(value: &str) -> EngineResult<u32> {
        let invalid = || EngineError::InvalidTimeFormat {
            value: value.to_string(),
        };

        let (hh, mm) = value.trim().split_once(':').ok_or_else(invalid)?;
        if hh.is_empty() || hh.len() > 2 || mm.len() != 2 {
            return Err(invalid());
        }

        let hours: u32 = hh.parse().map_err(|_| invalid())?;
        let minutes: u32 = mm.parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        Ok(hours * 60 + minutes)
    }

    /// 解析课时为分钟区间 [start, end)
    fn minute_range(session: &Session) -> EngineResult<(u32, u32)> {
        let start = Self::parse_hhmm(&session.start_time)?;
        let end = Self::parse_hhmm(&session.end_time)?;
        Ok((start, end))
    }

    /// 校验单个课时: 时间可解析且 start < end
    ///
    /// # 参数
    /// - course_code: 所属课程（仅用于错误信息）
    pub fn validate_session(&self, course_code: &str, session: &Session) -> EngineResult<()> {
        let (start, end) = Self::minute_range(session)?;
        if start >= end {
            return Err(EngineError::InvalidSession {
                course_code: course_code.to_string(),
                start_time: session.start_time.clone(),
                end_time: session.end_time.clone(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 两个课时是否冲突
    pub fn overlaps(&self, a: &Session, b: &Session) -> EngineResult<bool> {
        if a.day != b.day {
            return Ok(false);
        }

        let (start_a, end_a) = Self::minute_range(a)?;
        let (start_b, end_b) = Self::minute_range(b)?;

        Ok(!(end_a <= start_b || end_b <= start_a))
    }

    /// 冲突时段 "HH:MM-HH:MM"（不冲突返回 None）
    ///
    /// 用于诊断报告: [max(start), min(end))
    pub fn overlap_window(&self, a: &Session, b: &Session) -> EngineResult<Option<String>> {
        if !self.overlaps(a, b)? {
            return Ok(None);
        }

        let (start_a, end_a) = Self::minute_range(a)?;
        let (start_b, end_b) = Self::minute_range(b)?;
        let start = start_a.max(start_b);
        let end = end_a.min(end_b);

        Ok(Some(format!("{}-{}", format_minutes(start), format_minutes(end))))
    }
}

impl Default for ScheduleConflict {
    fn default() -> Self {
        Self::new()
    }
}

/// 分钟数格式化为 "HH:MM"
fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Weekday;

    fn session(day: Weekday, start: &str, end: &str) -> Session {
        Session::new(day, start, end)
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(ScheduleConflict::parse_hhmm("09:00").unwrap(), 540);
        assert_eq!(ScheduleConflict::parse_hhmm("9:05").unwrap(), 545);
        assert_eq!(ScheduleConflict::parse_hhmm("23:59").unwrap(), 1439);

        for bad in ["", "0900", "24:00", "12:60", "ab:cd", "12:5", "10:30:00"] {
            assert!(
                matches!(
                    ScheduleConflict::parse_hhmm(bad),
                    Err(EngineError::InvalidTimeFormat { .. })
                ),
                "应拒绝: {}",
                bad
            );
        }
    }

    #[test]
    fn test_overlap_same_day() {
        let checker = ScheduleConflict::new();
        let a = session(Weekday::Monday, "09:00", "10:50");
        let b = session(Weekday::Monday, "10:00", "11:50");
        assert!(checker.overlaps(&a, &b).unwrap());
        assert!(checker.overlaps(&b, &a).unwrap());
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        let checker = ScheduleConflict::new();
        let a = session(Weekday::Monday, "09:00", "10:00");
        let b = session(Weekday::Monday, "10:00", "11:00");
        assert!(!checker.overlaps(&a, &b).unwrap());
    }

    #[test]
    fn test_different_days_never_overlap() {
        let checker = ScheduleConflict::new();
        let a = session(Weekday::Monday, "09:00", "10:50");
        let b = session(Weekday::Tuesday, "09:00", "10:50");
        assert!(!checker.overlaps(&a, &b).unwrap());
    }

    #[test]
    fn test_malformed_time_fails_fast() {
        let checker = ScheduleConflict::new();
        let a = session(Weekday::Monday, "9am", "10:50");
        let b = session(Weekday::Monday, "09:00", "10:50");
        assert!(checker.overlaps(&a, &b).is_err());
    }

    #[test]
    fn test_overlap_window() {
        let checker = ScheduleConflict::new();
        let a = session(Weekday::Wednesday, "09:00", "10:50");
        let b = session(Weekday::Wednesday, "10:00", "11:50");
        assert_eq!(
            checker.overlap_window(&a, &b).unwrap(),
            Some("10:00-10:50".to_string())
        );

        let c = session(Weekday::Wednesday, "13:00", "14:00");
        assert_eq!(checker.overlap_window(&a, &c).unwrap(), None);
    }

    #[test]
    fn test_validate_session_rejects_inverted_range() {
        let checker = ScheduleConflict::new();
        let bad = session(Weekday::Friday, "11:00", "10:00");
        assert!(matches!(
            checker.validate_session("BIL101", &bad),
            Err(EngineError::InvalidSession { .. })
        ));
        let ok = session(Weekday::Friday, "10:00", "11:00");
        assert!(checker.validate_session("BIL101", &ok).is_ok());
    }
}
