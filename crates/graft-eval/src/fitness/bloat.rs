//! Size of the target files themselves, read back from the work directory

use super::{check_return_code, FitnessExtractor, Measure, StageRun};
use crate::status::StatusKind;

/// What is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloatUnit {
    Lines,
    Words,
    Chars,
}

/// Total size of all target files, measured after the test stage
#[derive(Debug, Clone, Copy)]
pub struct BloatFitness(pub BloatUnit);

impl BloatFitness {
    fn count(self, text: &str) -> usize {
        match self.0 {
            BloatUnit::Lines => text.lines().count(),
            BloatUnit::Words => text.split_whitespace().count(),
            BloatUnit::Chars => text.chars().count(),
        }
    }
}

impl FitnessExtractor for BloatFitness {
    fn name(&self) -> String {
        match self.0 {
            BloatUnit::Lines => "bloat_lines",
            BloatUnit::Words => "bloat_words",
            BloatUnit::Chars => "bloat_chars",
        }
        .to_string()
    }

    fn process_test_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        let mut total = 0usize;
        for file in stage_run.target_files {
            match std::fs::read_to_string(stage_run.work_path.join(file)) {
                Ok(text) => total += self.count(&text),
                Err(_) => {
                    measure.status = StatusKind::ParseError;
                    return;
                }
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let total = total as f64;
        measure.fitness = Some(total);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::exec;
    use super::*;
    use crate::fitness::process_stage;
    use crate::status::Stage;

    #[test]
    fn counts_every_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.c"), "int a;\nint b;\n").unwrap();
        std::fs::write(dir.path().join("b.c"), "x y z\n").unwrap();
        let files = vec!["a.c".to_string(), "b.c".to_string()];
        let result = exec(0, "", "");
        let stage_run = StageRun {
            exec: &result,
            work_path: dir.path(),
            target_files: &files,
        };
        let measure_with = |unit| {
            let mut m = Measure::success();
            process_stage(&BloatFitness(unit), Stage::Test, &mut m, &stage_run);
            m.fitness
        };
        assert_eq!(measure_with(BloatUnit::Lines), Some(3.0));
        assert_eq!(measure_with(BloatUnit::Words), Some(7.0));
        assert_eq!(measure_with(BloatUnit::Chars), Some(20.0));
    }
}
