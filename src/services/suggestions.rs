//! # 목표 제안 생성기의 경계
//!
//! 실제 서비스에서는 외부 AI 텍스트 생성기가 목표 목록을 받아 제안
//! 문구를 돌려줍니다. 이 모듈은 그 경계를 trait으로 고정하고, 외부
//! 호출 없이 동작하는 기본 구현을 제공합니다 — 테스트와 로컬 개발에서
//! 가짜 구현으로 바꿔 끼우기 위한 이음새(seam)입니다.

use crate::models::Goal;

/// 목표 목록 → 자유 텍스트 제안 목록
pub trait GoalSuggester: Send + Sync {
    fn suggest(&self, goals: &[Goal]) -> Vec<String>;
}

/// 규칙 기반 기본 구현
///
/// 흔한 케어 목표 템플릿에서, 이미 비슷한 제목의 목표가 있는 항목을
/// 걸러내고 최대 3개를 돌려줍니다.
pub struct TemplateSuggester;

const TEMPLATES: &[&str] = &[
    "Walk for 10 minutes after lunch",
    "Drink 6 glasses of water a day",
    "Record your blood pressure every morning",
    "Stretch for 5 minutes before bed",
    "Take a rest day between exercise days",
];

impl GoalSuggester for TemplateSuggester {
    fn suggest(&self, goals: &[Goal]) -> Vec<String> {
        TEMPLATES
            .iter()
            .filter(|t| {
                let t = t.to_lowercase();
                !goals.iter().any(|g| {
                    let title = g.title.to_lowercase();
                    t.contains(&title) || title.contains(&t)
                })
            })
            .take(3)
            .map(|t| t.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GoalStatus;

    fn goal_titled(title: &str) -> Goal {
        Goal {
            id: 1,
            patient_id: 1,
            title: title.to_string(),
            description: None,
            status: GoalStatus::Active,
            completed: false,
            due_date: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn suggests_at_most_three() {
        let suggestions = TemplateSuggester.suggest(&[]);
        assert_eq!(suggestions.len(), 3);
    }

    #[test]
    fn skips_templates_matching_existing_goals() {
        let existing = [goal_titled("Walk for 10 minutes after lunch")];
        let suggestions = TemplateSuggester.suggest(&existing);
        assert!(!suggestions.iter().any(|s| s.contains("Walk for 10 minutes")));
    }
}
