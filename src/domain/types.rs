// ==========================================
// 选课席位分配系统 - 领域类型定义
// ==========================================
// 职责: 闭合枚举（成绩、特殊身份、状态、拒绝原因、星期）
// 红线: 拒绝原因只能来自枚举,禁止从文本反推
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 字母成绩 (Letter Grade)
// ==========================================
// 固定有序枚举: FF < DD < DC < CC < CB < BB < BA < AA
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LetterGrade {
    Ff,
    Dd,
    Dc,
    Cc,
    Cb,
    Bb,
    Ba,
    Aa,
}

impl LetterGrade {
    /// 成绩对应的数值 (FF = 0.0 ... AA = 4.0)
    pub fn numeric_value(self) -> f64 {
        match self {
            LetterGrade::Aa => 4.0,
            LetterGrade::Ba => 3.5,
            LetterGrade::Bb => 3.0,
            LetterGrade::Cb => 2.5,
            LetterGrade::Cc => 2.0,
            LetterGrade::Dc => 1.5,
            LetterGrade::Dd => 1.0,
            LetterGrade::Ff => 0.0,
        }
    }

    /// 是否满足最低成绩要求（按数值比较）
    pub fn satisfies(self, min_grade: LetterGrade) -> bool {
        self.numeric_value() >= min_grade.numeric_value()
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LetterGrade::Aa => "AA",
            LetterGrade::Ba => "BA",
            LetterGrade::Bb => "BB",
            LetterGrade::Cb => "CB",
            LetterGrade::Cc => "CC",
            LetterGrade::Dc => "DC",
            LetterGrade::Dd => "DD",
            LetterGrade::Ff => "FF",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AA" => Ok(LetterGrade::Aa),
            "BA" => Ok(LetterGrade::Ba),
            "BB" => Ok(LetterGrade::Bb),
            "CB" => Ok(LetterGrade::Cb),
            "CC" => Ok(LetterGrade::Cc),
            "DC" => Ok(LetterGrade::Dc),
            "DD" => Ok(LetterGrade::Dd),
            "FF" => Ok(LetterGrade::Ff),
            other => Err(format!("unknown letter grade: {}", other)),
        }
    }
}

// ==========================================
// 特殊身份 (Special Status)
// ==========================================
// 未知标签一律按 None 处理（加分为 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialStatus {
    None,
    Scholarship,
    DoubleMajor,
    HonorStudent,
    Exchange,
}

impl SpecialStatus {
    /// 宽松解析: 未识别的标签回落为 None
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(SpecialStatus::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialStatus::None => "none",
            SpecialStatus::Scholarship => "scholarship",
            SpecialStatus::DoubleMajor => "double_major",
            SpecialStatus::HonorStudent => "honor_student",
            SpecialStatus::Exchange => "exchange",
        }
    }

    /// 展示用描述
    pub fn description(&self) -> &'static str {
        match self {
            SpecialStatus::None => "standard student",
            SpecialStatus::Scholarship => "scholarship student",
            SpecialStatus::DoubleMajor => "double major student",
            SpecialStatus::HonorStudent => "honor student",
            SpecialStatus::Exchange => "exchange student",
        }
    }
}

impl fmt::Display for SpecialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SpecialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(SpecialStatus::None),
            "scholarship" => Ok(SpecialStatus::Scholarship),
            "double_major" => Ok(SpecialStatus::DoubleMajor),
            "honor_student" => Ok(SpecialStatus::HonorStudent),
            "exchange" => Ok(SpecialStatus::Exchange),
            other => Err(format!("unknown special status: {}", other)),
        }
    }
}

// ==========================================
// 星期 (Weekday)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
            Weekday::Sunday => "SUNDAY",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MONDAY" | "MON" => Ok(Weekday::Monday),
            "TUESDAY" | "TUE" => Ok(Weekday::Tuesday),
            "WEDNESDAY" | "WED" => Ok(Weekday::Wednesday),
            "THURSDAY" | "THU" => Ok(Weekday::Thursday),
            "FRIDAY" | "FRI" => Ok(Weekday::Friday),
            "SATURDAY" | "SAT" => Ok(Weekday::Saturday),
            "SUNDAY" | "SUN" => Ok(Weekday::Sunday),
            other => Err(format!("unknown weekday: {}", other)),
        }
    }
}

// ==========================================
// 课程类型 (Course Type)
// ==========================================
// 仅用于诊断型冲突裁决的第三级比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    Required,
    TechnicalElective,
    Elective,
}

impl CourseType {
    /// 裁决序号: 越小越优先
    pub fn resolution_rank(self) -> u8 {
        match self {
            CourseType::Required => 1,
            CourseType::TechnicalElective => 2,
            CourseType::Elective => 3,
        }
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseType::Required => write!(f, "required"),
            CourseType::TechnicalElective => write!(f, "technical_elective"),
            CourseType::Elective => write!(f, "elective"),
        }
    }
}

impl FromStr for CourseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "required" => Ok(CourseType::Required),
            "technical_elective" => Ok(CourseType::TechnicalElective),
            "elective" => Ok(CourseType::Elective),
            other => Err(format!("unknown course type: {}", other)),
        }
    }
}

// ==========================================
// 先修类型 (Prerequisite Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrereqKind {
    Required,
    Recommended,
}

impl fmt::Display for PrereqKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrereqKind::Required => write!(f, "required"),
            PrereqKind::Recommended => write!(f, "recommended"),
        }
    }
}

impl FromStr for PrereqKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "required" => Ok(PrereqKind::Required),
            "recommended" => Ok(PrereqKind::Recommended),
            other => Err(format!("unknown prerequisite kind: {}", other)),
        }
    }
}

// ==========================================
// 选课申请状态 (Request Status)
// ==========================================
// 状态机: Pending -> {Approved | Rejected}, 终态不可回退（仅 reset 可回退）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

// ==========================================
// 注册状态 (Enrollment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Approved,
    Dropped,
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStatus::Approved => write!(f, "approved"),
            EnrollmentStatus::Dropped => write!(f, "dropped"),
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approved" => Ok(EnrollmentStatus::Approved),
            "dropped" => Ok(EnrollmentStatus::Dropped),
            other => Err(format!("unknown enrollment status: {}", other)),
        }
    }
}

// ==========================================
// 候补状态 (Waitlist Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Notified,
    Enrolled,
    Expired,
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitlistStatus::Waiting => write!(f, "waiting"),
            WaitlistStatus::Notified => write!(f, "notified"),
            WaitlistStatus::Enrolled => write!(f, "enrolled"),
            WaitlistStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for WaitlistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "waiting" => Ok(WaitlistStatus::Waiting),
            "notified" => Ok(WaitlistStatus::Notified),
            "enrolled" => Ok(WaitlistStatus::Enrolled),
            "expired" => Ok(WaitlistStatus::Expired),
            other => Err(format!("unknown waitlist status: {}", other)),
        }
    }
}

// ==========================================
// 拒绝原因 (Rejection Cause)
// ==========================================
// 由 RequestEvaluator / WaitlistManager 直接产出,指标按此分桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCause {
    QuotaFull,
    Prerequisite,
    Conflict,
    Other,
}

impl RejectionCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionCause::QuotaFull => "quota_full",
            RejectionCause::Prerequisite => "prerequisite",
            RejectionCause::Conflict => "conflict",
            RejectionCause::Other => "other",
        }
    }
}

impl fmt::Display for RejectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RejectionCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quota_full" => Ok(RejectionCause::QuotaFull),
            "prerequisite" => Ok(RejectionCause::Prerequisite),
            "conflict" => Ok(RejectionCause::Conflict),
            "other" => Ok(RejectionCause::Other),
            other => Err(format!("unknown rejection cause: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_grade_ordering_matches_numeric_value() {
        assert!(LetterGrade::Aa > LetterGrade::Ba);
        assert!(LetterGrade::Dd > LetterGrade::Ff);
        assert!(LetterGrade::Ff.numeric_value() == 0.0);
        assert!(LetterGrade::Aa.numeric_value() == 4.0);
        assert!(LetterGrade::Cc.satisfies(LetterGrade::Dd));
        assert!(!LetterGrade::Ff.satisfies(LetterGrade::Dd));
        assert!(LetterGrade::Dd.satisfies(LetterGrade::Dd));
    }

    #[test]
    fn test_special_status_lenient_parse() {
        assert_eq!(SpecialStatus::parse_lenient("double_major"), SpecialStatus::DoubleMajor);
        assert_eq!(SpecialStatus::parse_lenient("astronaut"), SpecialStatus::None);
        assert_eq!(SpecialStatus::parse_lenient(""), SpecialStatus::None);
    }

    #[test]
    fn test_rejection_cause_serde_is_snake_case() {
        let json = serde_json::to_string(&RejectionCause::QuotaFull).unwrap();
        assert_eq!(json, "\"quota_full\"");
        assert_eq!("conflict".parse::<RejectionCause>().unwrap(), RejectionCause::Conflict);
    }

    #[test]
    fn test_weekday_parse_accepts_short_names() {
        assert_eq!("mon".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!("FRIDAY".parse::<Weekday>().unwrap(), Weekday::Friday);
        assert!("Pazartesi".parse::<Weekday>().is_err());
    }
}
