//append-only series addressed by relative offset
//offset 0 is the newest value, -1 the one before it, and so on
#[derive(Debug, Clone, Default)]
pub struct Line {
    values: Vec<f64>,
}

impl Line {
    pub fn new() -> Self {
        Line { values: Vec::new() }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    //returns the value `ago` steps back from the newest one
    //positive offsets look into the future and always return none
    pub fn get(&self, ago: isize) -> Option<f64> {
        if ago > 0 {
            return None;
        }
        let back = ago.unsigned_abs();
        let len = self.values.len();
        if back >= len {
            return None;
        }
        Some(self.values[len - 1 - back])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for Line {
    fn from(values: Vec<f64>) -> Self {
        Line { values }
    }
}
