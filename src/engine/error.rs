// ==========================================
// 选课席位分配系统 - 引擎层错误类型
// ==========================================
// 职责: 输入契约违反（脏数据）与运行中止
// 红线: 名额满/先修不足/时间冲突是策略结果,不是错误,不得进入本枚举
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ===== 输入契约违反 =====
    #[error("时间格式错误 (期望 HH:MM): {value}")]
    InvalidTimeFormat { value: String },

    #[error("课时无效: course={course_code}, {start_time}-{end_time} (开始时间必须早于结束时间)")]
    InvalidSession {
        course_code: String,
        start_time: String,
        end_time: String,
    },

    #[error("学生不存在: {student_id}")]
    StudentNotFound { student_id: String },

    #[error("课程不存在: {course_code}")]
    CourseNotFound { course_code: String },

    #[error("重复的活跃申请: student={student_id}, course={course_code}")]
    InvalidRank {
        student_id: String,
        course_code: String,
    },

    // ===== 运行控制 =====
    #[error("运行已取消: 已处理学生数={processed_students}")]
    Cancelled { processed_students: u32 },

    #[error("配置错误: {0}")]
    Config(String),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
