use crate::calendar::{load_meetings, MeetingGroups};
use crate::cli::{Cli, Commands};
use crate::config::{default_config_path, env_lookup, AccessConfig, Overrides, RunOptions, Settings};
use crate::env_manager::{create_env_template, missing_env_vars};
use crate::feedback::{request_feedback, FeedbackOutcome};
use crate::invites::{build_event_payload, dispatch_invites, InviteOutcome};
use crate::services::{CalendarService, ClientCredentialsProvider, GraphClient, ServiceError, Session};
use crate::wait::{wait_for_consistency, WaitStrategy};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Parameters for one invite-wait-feedback pass.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub reminder_minutes: u32,
    pub wait: WaitStrategy,
    pub marker: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub invites: Vec<InviteOutcome>,
    pub feedback: Vec<FeedbackOutcome>,
}

impl RunReport {
    pub fn invited(&self) -> usize {
        self.invites.iter().filter(|o| o.is_success()).count()
    }

    pub fn feedback_sent(&self) -> usize {
        self.feedback.iter().filter(|o| o.is_sent()).count()
    }

    /// Subjects of meetings whose invite or feedback request did not go through.
    pub fn failed_subjects(&self) -> impl Iterator<Item = &str> {
        let invites = self.invites.iter().filter(|o| !o.is_success()).map(InviteOutcome::subject);
        let feedback = self.feedback.iter().filter(|o| o.is_failure()).map(FeedbackOutcome::subject);
        invites.chain(feedback)
    }
}

fn report_failures<'a>(subjects: impl Iterator<Item = &'a str>) {
    let failed: Vec<&str> = subjects.collect();
    if !failed.is_empty() {
        warn!("{} request(s) did not go through: {}", failed.len(), failed.join(", "));
    }
}

/// Dispatch invites, wait for them to propagate, then request feedback.
///
/// Per-item failures are in the report; only a failed event listing aborts.
pub async fn run_pipeline(
    service: &dyn CalendarService,
    groups: &MeetingGroups,
    plan: &RunPlan,
) -> Result<RunReport, ServiceError> {
    let invites = dispatch_invites(service, groups, plan.reminder_minutes).await;

    let created: Vec<String> = invites.iter().filter_map(|o| o.event_id().map(str::to_string)).collect();
    if !wait_for_consistency(service, &created, plan.wait).await {
        warn!("Continuing with feedback requests before all new events are visible");
    }

    let feedback = request_feedback(service, &plan.marker).await?;
    Ok(RunReport { invites, feedback })
}

pub struct Application {
    settings: Settings,
    options: RunOptions,
    config_path: Option<PathBuf>,
}

impl Application {
    pub fn new(cli: &Cli) -> Result<Self> {
        let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
        let overrides = Overrides { csv: cli.csv.clone(), marker: cli.marker.clone() };
        let options = RunOptions::resolve(&overrides, &settings, env_lookup);
        debug!("Input {:?}, feedback marker '{}'", options.csv_path, options.marker);
        Ok(Self { settings, options, config_path: cli.config.clone() })
    }

    pub async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run { dry_run } => self.run(dry_run).await,
            Commands::Invite { dry_run } => self.invite(dry_run).await,
            Commands::Feedback => self.feedback().await,
            Commands::Check => self.check(),
            Commands::InitConfig { force } => init_config(self.config_path.as_deref(), force),
        }
    }

    fn meetings(&self) -> Result<MeetingGroups> {
        let groups = load_meetings(
            &self.options.csv_path,
            &self.settings.import_options(),
            &self.settings.grouping_options(),
        )
        .with_context(|| format!("Failed to load meetings from {}", self.options.csv_path.display()))?;
        Ok(groups)
    }

    /// Read credentials, fetch the first token and build the Graph client.
    async fn connect(&self) -> Result<GraphClient> {
        let access = AccessConfig::from_env()?;
        let timeout = self.settings.http_timeout();

        let provider = ClientCredentialsProvider::new(access.credentials, &self.settings.http.authority_url, timeout)?;
        let session = Session::start(provider).await.context("Failed to acquire access token")?;
        info!("Authenticated for mailbox {}", access.mailbox);

        let client = GraphClient::new(
            &self.settings.http.graph_url,
            &access.mailbox,
            session,
            timeout,
            self.settings.retry_policy(),
        )?;
        Ok(client)
    }

    fn plan(&self) -> RunPlan {
        RunPlan {
            reminder_minutes: self.settings.invite.reminder_minutes,
            wait: self.settings.wait_strategy(),
            marker: self.options.marker.clone(),
        }
    }

    fn print_payloads(&self, groups: &MeetingGroups) -> Result<()> {
        for group in groups {
            let payload = build_event_payload(group, self.settings.invite.reminder_minutes);
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        println!("Dry run: {} event(s) not submitted", groups.len());
        Ok(())
    }

    async fn run(&self, dry_run: bool) -> Result<()> {
        if dry_run {
            return self.print_payloads(&self.meetings()?);
        }

        let client = self.connect().await?;
        let groups = self.meetings()?;

        let report = run_pipeline(&client, &groups, &self.plan()).await.context("Feedback scan failed")?;
        println!(
            "Invited attendees for {} of {} meeting(s); sent {} feedback request(s)",
            report.invited(),
            report.invites.len(),
            report.feedback_sent()
        );
        report_failures(report.failed_subjects());
        Ok(())
    }

    async fn invite(&self, dry_run: bool) -> Result<()> {
        if dry_run {
            return self.print_payloads(&self.meetings()?);
        }

        let client = self.connect().await?;
        let groups = self.meetings()?;

        let outcomes = dispatch_invites(&client, &groups, self.settings.invite.reminder_minutes).await;
        let invited = outcomes.iter().filter(|o| o.is_success()).count();
        println!("Invited attendees for {} of {} meeting(s)", invited, outcomes.len());
        report_failures(outcomes.iter().filter(|o| !o.is_success()).map(InviteOutcome::subject));
        Ok(())
    }

    async fn feedback(&self) -> Result<()> {
        let client = self.connect().await?;
        let outcomes = request_feedback(&client, &self.options.marker).await.context("Feedback scan failed")?;
        let sent = outcomes.iter().filter(|o| o.is_sent()).count();
        println!("Sent {} of {} feedback request(s)", sent, outcomes.len());
        report_failures(outcomes.iter().filter(|o| o.is_failure()).map(FeedbackOutcome::subject));
        Ok(())
    }

    fn check(&self) -> Result<()> {
        let groups = self.meetings()?;

        for group in &groups {
            let d = &group.details;
            println!(
                "{} | {} | {} {}-{} until {} ({}) | {} required, {} optional",
                d.subject,
                d.occurrence,
                d.start_date,
                d.start_time.format("%H:%M"),
                d.end_time.format("%H:%M"),
                d.end_date,
                d.time_zone,
                group.required.len(),
                group.optional.len()
            );
        }
        println!("{} meeting(s) ready to send", groups.len());

        let missing = missing_env_vars();
        if !missing.is_empty() {
            println!("Warning: missing environment variable(s): {}", missing.join(", "));
        }
        Ok(())
    }
}

/// Write default settings and a `.env` template, keeping existing files unless `force`.
pub fn init_config(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path: PathBuf = match config_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
    } else {
        Settings::default().save(&path)?;
        println!("Wrote default settings to {}", path.display());
    }

    let env_path = Path::new(".env");
    if create_env_template(env_path, force).context("Failed to write .env template")? {
        println!("Wrote environment template to {}", env_path.display());
    } else {
        println!("Keeping existing {}", env_path.display());
    }
    Ok(())
}
