//! Sprint manager agent: standup, risks, sprint health and suggested actions.
//!
//! Read-only. Uses `get_issue`, `get_active_sprint` and sprint issue listing
//! from [`TrackerRead`] and nothing else.

use crate::text::{bullet_list, extract_board_id, extract_issue_keys, extract_sprint_id};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sprintmind_common::{
    Agent, AgentReport, AgentRequest, Capability, ContextUpdate, Result, SprintMetrics,
};
use sprintmind_tracker::format::{format_issue, parse_jira_datetime};
use sprintmind_tracker::{Issue, Sprint, TrackerErrorKind, TrackerRead};
use std::sync::Arc;
use tracing::{debug, info};

pub const STANDUP_LABEL: &str = "Daily Standup Summary";
pub const RISKS_LABEL: &str = "Risk Alerts";
pub const HEALTH_LABEL: &str = "Sprint Health Insights";
pub const ACTIONS_LABEL: &str = "Suggested Actions";

/// Days ahead that count as "close to deadline".
const NEAR_DEADLINE_DAYS: i64 = 2;
/// Sprint ending within this many days with most work open is a risk.
const SPRINT_ENDING_DAYS: i64 = 2;
const OVERLOAD_MIN_OPEN: usize = 3;
const OVERLOAD_FACTOR: f64 = 1.5;
/// Completion trailing elapsed time by more than this many points is "at risk".
const AT_RISK_GAP: f64 = 20.0;

const SPRINT_MANAGER_PROMPT: &str = r#"You are SprintMind's Sprint Manager, an AI scrum master and risk detector.

1. Daily standups: summarize Completed, In Progress and Blocked work per team member.
2. Risk detection: overdue or near-deadline tasks, workload imbalance, blocking dependencies.
3. Sprint health: committed vs done, burn-down style progress, goals at risk.
4. Communication: concise, team-friendly summaries suitable for chat.

Output sections: Daily Standup Summary, Risk Alerts, Sprint Health Insights, Suggested Actions.
"#;

const UNASSIGNED: &str = "Unassigned";

/// Where an issue stands for the standup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Completed,
    InProgress,
    Blocked,
    ToDo,
}

impl WorkState {
    const ORDER: [WorkState; 4] = [
        WorkState::Completed,
        WorkState::InProgress,
        WorkState::Blocked,
        WorkState::ToDo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WorkState::Completed => "Completed",
            WorkState::InProgress => "In Progress",
            WorkState::Blocked => "Blocked",
            WorkState::ToDo => "To Do",
        }
    }
}

/// Blocked wins over in-progress; done wins over everything.
pub fn classify_issue(issue: &Issue) -> WorkState {
    if issue.is_done() {
        return WorkState::Completed;
    }

    let blocked = issue.status_name().to_lowercase().contains("block")
        || issue
            .fields
            .labels
            .iter()
            .any(|l| l.eq_ignore_ascii_case("blocked"))
        || issue.is_flagged();
    if blocked {
        return WorkState::Blocked;
    }

    if issue.status_category() == "indeterminate" {
        WorkState::InProgress
    } else {
        WorkState::ToDo
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAlert {
    pub message: String,
    pub action: String,
}

/// Sprint manager agent.
pub struct SprintManagerAgent {
    tracker: Arc<dyn TrackerRead>,
    default_board_id: Option<u64>,
    today: Option<NaiveDate>,
}

impl SprintManagerAgent {
    pub fn new(tracker: Arc<dyn TrackerRead>) -> Self {
        Self {
            tracker,
            default_board_id: None,
            today: None,
        }
    }

    pub fn with_default_board(mut self, board_id: Option<u64>) -> Self {
        self.default_board_id = board_id;
        self
    }

    /// Pin "today" for deadline arithmetic.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Which sprint to report on, plus the sprint record when known.
    async fn resolve_sprint(
        &self,
        request: &AgentRequest,
        board_id: Option<u64>,
    ) -> Result<Option<(u64, Option<Sprint>)>> {
        if let Some(sprint_id) = extract_sprint_id(&request.text) {
            return Ok(Some((sprint_id, None)));
        }

        if let Some(board_id) = board_id {
            let active = self.tracker.get_active_sprint(board_id).await?;
            return Ok(active.map(|s| (s.id, Some(s))));
        }

        Ok(request.context.sprint_id.map(|id| (id, None)))
    }

    async fn issue_details(&self, keys: &[String]) -> Result<Vec<(String, String)>> {
        let mut details = Vec::new();
        for key in keys {
            let body = match self.tracker.get_issue(key).await {
                Ok(issue) => describe_issue(&issue),
                Err(e) if e.kind() == TrackerErrorKind::NotFound => {
                    format!("{} was not found.", key)
                }
                Err(e) => return Err(e.into()),
            };
            details.push((format!("Issue {}", key), body));
        }
        Ok(details)
    }
}

#[async_trait]
impl Agent for SprintManagerAgent {
    fn id(&self) -> &str {
        "sprint_manager"
    }

    fn name(&self) -> &str {
        "Sprint Manager"
    }

    fn capability(&self) -> Capability {
        Capability::Reporting
    }

    fn system_prompt(&self) -> &str {
        SPRINT_MANAGER_PROMPT
    }

    async fn run(&self, request: &AgentRequest) -> Result<AgentReport> {
        let board_id = extract_board_id(&request.text)
            .or(request.context.board_id)
            .or(self.default_board_id);

        info!(agent = %self.id(), board_id = ?board_id, "Preparing sprint report");

        let details = self.issue_details(&extract_issue_keys(&request.text)).await?;
        let mut report = AgentReport::new(self.id(), self.name());

        let Some((sprint_id, sprint)) = self.resolve_sprint(request, board_id).await? else {
            let where_ = board_id
                .map(|b| format!("board {}", b))
                .unwrap_or_else(|| "the configured board".to_string());
            report = report
                .section(STANDUP_LABEL, format!("No active sprint found on {}.", where_))
                .section(RISKS_LABEL, "No active sprint, nothing to assess.")
                .section(HEALTH_LABEL, "No active sprint.")
                .section(
                    ACTIONS_LABEL,
                    "Start a sprint, or name one explicitly (for example \"sprint 42\" or \"board 7\").",
                );
            for (label, body) in details {
                report = report.section(label, body);
            }
            return Ok(report.with_context_update(ContextUpdate {
                board_id,
                ..Default::default()
            }));
        };

        let issues = self.tracker.get_all_sprint_issues(sprint_id).await?;
        debug!(sprint_id, issues = issues.len(), "Loaded sprint issues");

        let today = self.today();
        let metrics = compute_metrics(&issues);
        let alerts = detect_risks(&issues, sprint.as_ref(), &metrics, today);

        report = report
            .section(STANDUP_LABEL, standup_summary(&issues))
            .section(
                RISKS_LABEL,
                bullet_list(
                    &alerts.iter().map(|a| a.message.as_str()).collect::<Vec<_>>(),
                    "No risks detected.",
                ),
            )
            .section(
                HEALTH_LABEL,
                health_insights(sprint_id, sprint.as_ref(), &metrics, today),
            )
            .section(ACTIONS_LABEL, suggested_actions(&alerts));
        for (label, body) in details {
            report = report.section(label, body);
        }

        Ok(report.with_context_update(ContextUpdate {
            sprint_id: Some(sprint_id),
            board_id,
            team_members: team_members(&issues),
            metrics: Some(metrics),
            issue_keys: Vec::new(),
        }))
    }
}

fn describe_issue(issue: &Issue) -> String {
    let mut out = format_issue(issue);
    if let Some(due) = issue.fields.duedate {
        out.push_str(&format!("Due: {}\n", due));
    }
    if let Some(priority) = &issue.fields.priority {
        out.push_str(&format!("Priority: {}\n", priority.name));
    }
    out.trim_end().to_string()
}

/// Assignee display names in first-seen order, without "Unassigned".
pub fn team_members(issues: &[Issue]) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();
    for issue in issues {
        let name = issue.assignee_name();
        if name != UNASSIGNED && !members.iter().any(|m| m == name) {
            members.push(name.to_string());
        }
    }
    members
}

pub fn compute_metrics(issues: &[Issue]) -> SprintMetrics {
    let mut metrics = SprintMetrics {
        committed: issues.len(),
        ..Default::default()
    };

    let has_points = issues.iter().any(|i| i.fields.story_points.is_some());
    let mut committed_points = 0.0;
    let mut done_points = 0.0;

    for issue in issues {
        let points = issue.fields.story_points.unwrap_or(0.0);
        committed_points += points;
        match classify_issue(issue) {
            WorkState::Completed => {
                metrics.done += 1;
                done_points += points;
            }
            WorkState::InProgress => metrics.in_progress += 1,
            WorkState::Blocked => metrics.blocked += 1,
            WorkState::ToDo => {}
        }
    }

    metrics.remaining = metrics.committed - metrics.done;
    if has_points {
        metrics.committed_points = Some(committed_points);
        metrics.done_points = Some(done_points);
    }
    metrics
}

fn standup_summary(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "The sprint has no issues yet.".to_string();
    }

    let mut people = team_members(issues);
    if issues.iter().any(|i| i.assignee_name() == UNASSIGNED) {
        people.push(UNASSIGNED.to_string());
    }

    let mut blocks = Vec::new();
    for person in &people {
        let mine: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.assignee_name() == person)
            .collect();

        let mut lines = vec![person.clone()];
        for state in WorkState::ORDER {
            let entries: Vec<String> = mine
                .iter()
                .filter(|i| classify_issue(i) == state)
                .map(|i| format!("{} {}", i.key, i.fields.summary))
                .collect();
            if !entries.is_empty() {
                lines.push(format!("  {}: {}", state.label(), entries.join("; ")));
            }
        }
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n")
}

/// Every alert with its follow-up action, in a stable order.
pub fn detect_risks(
    issues: &[Issue],
    sprint: Option<&Sprint>,
    metrics: &SprintMetrics,
    today: NaiveDate,
) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();

    for issue in issues.iter().filter(|i| !i.is_done()) {
        let owner = issue.assignee_name();

        if classify_issue(issue) == WorkState::Blocked {
            alerts.push(RiskAlert {
                message: format!("{} is blocked ({})", issue.key, owner),
                action: format!("Swarm on the blocker for {} with {}", issue.key, owner),
            });
        }

        if let Some(due) = issue.fields.duedate {
            let days = (due - today).num_days();
            if days < 0 {
                alerts.push(RiskAlert {
                    message: format!(
                        "{} ({}) is overdue by {} day(s), due {}",
                        issue.key, owner, -days, due
                    ),
                    action: format!("Re-plan or escalate {} with {}", issue.key, owner),
                });
            } else if days <= NEAR_DEADLINE_DAYS {
                alerts.push(RiskAlert {
                    message: format!(
                        "{} ({}) is due in {} day(s), on {}",
                        issue.key, owner, days, due
                    ),
                    action: format!("Confirm {} can land by {}", issue.key, due),
                });
            }
        }

        for link in &issue.fields.issuelinks {
            if !link.link_type.name.eq_ignore_ascii_case("blocks") {
                continue;
            }
            let Some(blocker) = &link.inward_issue else {
                continue;
            };
            let blocker_done = blocker
                .fields
                .as_ref()
                .and_then(|f| f.status.as_ref())
                .and_then(|s| s.status_category.as_ref())
                .map(|c| c.key.eq_ignore_ascii_case("done"))
                .unwrap_or(false);
            if !blocker_done {
                alerts.push(RiskAlert {
                    message: format!("{} is blocked by {}", issue.key, blocker.key),
                    action: format!("Resolve {} to unblock {}", blocker.key, issue.key),
                });
            }
        }
    }

    alerts.extend(workload_alerts(issues));

    if let Some(days_left) = sprint.and_then(|s| days_until_end(s, today)) {
        let mostly_open = metrics.committed > 0 && metrics.remaining * 2 > metrics.committed;
        if (0..=SPRINT_ENDING_DAYS).contains(&days_left) && mostly_open {
            alerts.push(RiskAlert {
                message: format!(
                    "Sprint ends in {} day(s) with {} of {} issues remaining",
                    days_left, metrics.remaining, metrics.committed
                ),
                action: format!(
                    "Descope or carry over {} issues before the sprint closes",
                    metrics.remaining
                ),
            });
        }
    }

    alerts
}

fn workload_alerts(issues: &[Issue]) -> Vec<RiskAlert> {
    let members = team_members(issues);
    if members.len() < 2 {
        return Vec::new();
    }

    let open: Vec<(String, usize)> = members
        .into_iter()
        .map(|m| {
            let count = issues
                .iter()
                .filter(|i| !i.is_done() && i.assignee_name() == m)
                .count();
            (m, count)
        })
        .collect();

    let average = open.iter().map(|(_, c)| *c).sum::<usize>() as f64 / open.len() as f64;

    open.into_iter()
        .filter(|(_, count)| {
            *count >= OVERLOAD_MIN_OPEN && *count as f64 >= OVERLOAD_FACTOR * average
        })
        .map(|(member, count)| RiskAlert {
            message: format!(
                "Workload imbalance: {} holds {} open issues (team average {:.1})",
                member, count, average
            ),
            action: format!("Rebalance work away from {}", member),
        })
        .collect()
}

fn sprint_date(raw: Option<&String>) -> Option<NaiveDate> {
    raw.and_then(|r| parse_jira_datetime(r))
        .map(|d| d.date_naive())
}

fn days_until_end(sprint: &Sprint, today: NaiveDate) -> Option<i64> {
    sprint_date(sprint.end_date.as_ref()).map(|end| (end - today).num_days())
}

/// Share of the sprint's calendar time already used, 0-100.
pub fn elapsed_percent(sprint: &Sprint, today: NaiveDate) -> Option<f64> {
    let start = sprint_date(sprint.start_date.as_ref())?;
    let end = sprint_date(sprint.end_date.as_ref())?;
    let total = (end - start).num_days();
    if total <= 0 {
        return None;
    }
    let used = (today - start).num_days() as f64 / total as f64 * 100.0;
    Some(used.clamp(0.0, 100.0))
}

fn health_insights(
    sprint_id: u64,
    sprint: Option<&Sprint>,
    metrics: &SprintMetrics,
    today: NaiveDate,
) -> String {
    let mut lines = Vec::new();

    match sprint {
        Some(s) => {
            let mut header = format!("Sprint: {} (id {})", s.name, s.id);
            if let Some(goal) = s.goal.as_deref().filter(|g| !g.trim().is_empty()) {
                header.push_str(&format!(", goal: {}", goal.trim()));
            }
            lines.push(header);
        }
        None => lines.push(format!("Sprint: id {}", sprint_id)),
    }

    lines.push(format!(
        "Committed: {} | Done: {} | In progress: {} | Blocked: {} | Remaining: {}",
        metrics.committed, metrics.done, metrics.in_progress, metrics.blocked, metrics.remaining
    ));
    if let (Some(committed), Some(done)) = (metrics.committed_points, metrics.done_points) {
        lines.push(format!(
            "Story points: {} of {} done, {} remaining",
            done,
            committed,
            committed - done
        ));
    }

    let completion = metrics.completion_ratio() * 100.0;
    lines.push(format!("Completion: {:.0}%", completion));

    match sprint.and_then(|s| elapsed_percent(s, today)) {
        Some(elapsed) => {
            lines.push(format!("Time elapsed: {:.0}%", elapsed));
            let gap = elapsed - completion;
            if gap > AT_RISK_GAP {
                lines.push(format!(
                    "Verdict: at risk, completion trails elapsed time by {:.0} points",
                    gap
                ));
            } else {
                lines.push("Verdict: on track".to_string());
            }
        }
        None => lines.push("Time elapsed: unknown (sprint dates unavailable)".to_string()),
    }

    lines.join("\n")
}

fn suggested_actions(alerts: &[RiskAlert]) -> String {
    let mut actions: Vec<&str> = Vec::new();
    for alert in alerts {
        if !actions.contains(&alert.action.as_str()) {
            actions.push(&alert.action);
        }
    }

    if actions.is_empty() {
        return "No risks detected, keep the current plan.".to_string();
    }

    actions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a))
        .collect::<Vec<_>>()
        .join("\n")
}
