//! Role prompt templates.
//!
//! Plain `String`-building functions, one per role, in the style of the
//! teacher's `format_task_prompt` in the old `main.rs`: push onto a
//! `String` section by section rather than templating through a crate.

use coordination::{BeanCounterOutput, Chunk, PlanProposal};

pub fn refiner_prompt(human_task: &str, rejection_feedback: Option<&str>) -> String {
    let mut prompt = format!("# Task refinement\n\nHuman-authored task:\n\n{human_task}\n\n");
    if let Some(feedback) = rejection_feedback {
        prompt.push_str(&format!(
            "The human rejected your previous refinement with this feedback:\n\n{feedback}\n\n"
        ));
    }
    prompt.push_str(
        "Restate this task clearly and unambiguously for an implementation team. \
         Ask at most one clarifying question if something is genuinely ambiguous; \
         otherwise produce the refined task description directly.",
    );
    prompt
}

pub fn planner_prompt(task: &str, curmudgeon_feedback: Option<&str>, retry_feedback: Option<&str>) -> String {
    let mut prompt = format!("# Plan\n\nTask:\n\n{task}\n\n");
    if let Some(feedback) = curmudgeon_feedback {
        prompt.push_str(&format!("Simplify per this feedback from a previous review:\n\n{feedback}\n\n"));
    }
    if let Some(feedback) = retry_feedback {
        prompt.push_str(&format!("The previous attempt at this task needs rework:\n\n{feedback}\n\n"));
    }
    prompt.push_str("Produce a markdown plan with numbered, reviewable steps.");
    prompt
}

pub fn curmudgeon_prompt(plan_markdown: &str) -> String {
    format!(
        "# Plan review\n\nCritique this plan for unnecessary complexity. \
         Reply with one of: \"approve\", \"simplify: <feedback>\", or \"reject: <feedback>\".\n\n{plan_markdown}"
    )
}

pub fn bean_counter_prompt(plan_markdown: &str, completed_summary: Option<&str>) -> String {
    let mut prompt = String::new();
    match completed_summary {
        None => {
            prompt.push_str(&format!(
                "# Chunking\n\nBreak this plan into reviewable chunks, one at a time:\n\n{plan_markdown}\n\n"
            ));
        }
        Some(summary) => {
            prompt.push_str(&format!("[CHUNK_COMPLETED]\n{summary}\n\n[NEXT_CHUNKING]\n"));
        }
    }
    prompt.push_str(
        "Reply with the next chunk as a short description followed by bullet-point requirements, \
         or the single line TASK_COMPLETE if every step of the plan has been chunked and completed.",
    );
    prompt
}

pub fn coder_plan_prompt(chunk: &Chunk, plan_feedback: Option<&str>) -> String {
    let mut prompt = format!(
        "# Propose an implementation plan for this chunk\n\n{}\n\nRequirements:\n",
        chunk.description
    );
    for req in &chunk.requirements {
        prompt.push_str(&format!("- {req}\n"));
    }
    if !chunk.context.is_empty() {
        prompt.push_str(&format!("\nContext:\n{}\n", chunk.context));
    }
    if let Some(feedback) = plan_feedback {
        prompt.push_str(&format!("\nThe reviewer asked for changes: {feedback}\n"));
    }
    prompt.push_str(
        "\nReply with a JSON object: {\"description\": string, \"steps\": [string], \"affected_files\": [string]}.",
    );
    prompt
}

pub fn coder_apply_prompt(plan: &PlanProposal, code_feedback: Option<&str>) -> String {
    let mut prompt = format!("# Apply this plan\n\n{}\n\nSteps:\n", plan.description);
    for step in &plan.steps {
        prompt.push_str(&format!("- {step}\n"));
    }
    if let Some(feedback) = code_feedback {
        prompt.push_str(&format!("\nThe reviewer asked for changes: {feedback}\n"));
    }
    prompt.push_str("\nMake the changes directly using the available tools, then summarize what changed.");
    prompt
}

pub fn reviewer_plan_prompt(plan: &PlanProposal) -> String {
    format!(
        "# Review this implementation plan\n\n{}\n\nSteps: {:?}\nAffected files: {:?}\n\n\
         Reply with a JSON object: {{\"verdict\": \"approve-plan\" | \"revise-plan\" | \"reject-plan\" | \"needs-human\", \"feedback\": string}} \
         (feedback required except for approve-plan).",
        plan.description, plan.steps, plan.affected_files
    )
}

pub fn reviewer_code_prompt(diff: &str, is_last_chunk: bool) -> String {
    format!(
        "# Review this diff\n\n{diff}\n\n\
         Reply with a JSON object: {{\"verdict\": \"approve-code\" | \"revise-code\" | \"reject-code\" | \"step-complete\" | \"task-complete\" | \"needs-human\", \"feedback\": string}}.\n\
         {}",
        if is_last_chunk {
            "This may be the final chunk of the plan; use task-complete if nothing remains."
        } else {
            "Use step-complete if this chunk is done but more chunks remain."
        }
    )
}

pub fn super_reviewer_prompt(diff: &str) -> String {
    format!(
        "# Final review of the full task diff\n\n{diff}\n\n\
         Reply with a JSON object: {{\"outcome\": \"approve\" | \"needs_human\", \"summary\": string, \"issues\": [string]}}."
    )
}

pub fn gardener_prompt(task_summary: &str) -> String {
    format!(
        "# Update project notes\n\nSummarize and record this completed task in the project's notes file:\n\n{task_summary}"
    )
}

pub fn describe_bean_counter_completion(output: &BeanCounterOutput) -> Option<String> {
    match output {
        BeanCounterOutput::WorkChunk { description, .. } => Some(description.clone()),
        BeanCounterOutput::TaskComplete => None,
    }
}
