use super::{FormState, InputCapability};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionProgress {
    pub title: String,
    pub filled: usize,
    pub total: usize,
}

/// Required-field completion, per wizard step and overall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub per_section: Vec<SectionProgress>,
    // (filled, total)
    pub global: (usize, usize),
}

impl Progress {
    pub fn ratio(&self) -> f64 {
        let (filled, total) = self.global;
        if total == 0 {
            1.0
        } else {
            filled as f64 / total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.global.0 == self.global.1
    }
}

/// Pure over the current form state; calling it twice yields the same
/// result.
pub fn compute_progress(form: &FormState) -> Progress {
    let mut out = Progress::default();
    for (idx, section) in form.sections().iter().enumerate() {
        let required: Vec<_> = form
            .section_fields(idx)
            .into_iter()
            .filter(|f| f.required)
            .collect();
        let filled = required.iter().filter(|f| f.input.is_filled()).count();
        out.global.0 += filled;
        out.global.1 += required.len();
        out.per_section.push(SectionProgress {
            title: section.title.clone(),
            filled,
            total: required.len(),
        });
    }
    out
}

/// Labels of required fields still empty, in display order.
pub fn missing_required(form: &FormState) -> Vec<String> {
    (0..form.sections().len())
        .flat_map(|idx| form.section_fields(idx))
        .filter(|f| f.required && !f.input.is_filled())
        .map(|f| f.label.clone())
        .collect()
}
