//! Automation-aware user gateway
//!
//! In NONE mode the worker is interactive: plan review and input requests go
//! to the terminal. In the automation modes there is no human in the loop,
//! so review approves immediately and input requests get a standing answer.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use forge_core::{AutomationMode, ForgeError, Plan, Result};
use forge_orchestrator::{ReviewDecision, UserGateway};

const AUTONOMOUS_ANSWER: &str =
    "No user is available. Proceed with your best judgment and note the assumption.";

pub struct ConsoleGateway {
    mode: AutomationMode,
}

impl ConsoleGateway {
    pub fn new(mode: AutomationMode) -> Self {
        Self { mode }
    }

    fn interactive(&self) -> bool {
        self.mode == AutomationMode::None
    }

    async fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| ForgeError::Other(format!("Failed to read stdin: {}", e)))?;
        Ok(line.trim().to_string())
    }
}

#[async_trait]
impl UserGateway for ConsoleGateway {
    async fn notify(&self, message: &str) -> Result<()> {
        println!("[agent] {}", message);
        Ok(())
    }

    async fn review_plan(&self, plan: &Plan) -> Result<ReviewDecision> {
        if !self.interactive() {
            tracing::info!(mode = %self.mode, "Plan auto-approved by automation policy");
            return Ok(ReviewDecision::Approved);
        }

        println!("Proposed plan:");
        for step in &plan.steps {
            println!("  {}. {}", step.id + 1, step.description);
        }
        println!("Approve? [y/N, or type a rejection reason]");

        let answer = self.read_line().await?;
        match answer.to_lowercase().as_str() {
            "y" | "yes" => Ok(ReviewDecision::Approved),
            "" | "n" | "no" => Ok(ReviewDecision::Rejected("Plan rejected".to_string())),
            _ => Ok(ReviewDecision::Rejected(answer)),
        }
    }

    async fn provide_input(&self, prompt: &str) -> Result<String> {
        if !self.interactive() {
            tracing::warn!(prompt, "Input requested in automation mode, answering autonomously");
            return Ok(AUTONOMOUS_ANSWER.to_string());
        }
        println!("[agent asks] {}", prompt);
        self.read_line().await
    }
}
