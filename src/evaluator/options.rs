// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Evaluation options

use bitflags::bitflags;

bitflags! {
    /// Flags controlling how an expression is compiled and evaluated
    ///
    /// The default is the empty set.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct EvaluateOptions: u32 {
        /// Compare parameter and function names case-insensitively
        const IGNORE_CASE = 1 << 0;
        /// Always reparse instead of going through the expression cache
        const NO_CACHE = 1 << 1;
        /// Broadcast evaluation across list-valued parameters
        const ITERATE_PARAMETERS = 1 << 2;
        /// `Round` uses away-from-zero midpoint rounding instead of banker's rounding
        const ROUND_AWAY_FROM_ZERO = 1 << 3;
    }
}

impl EvaluateOptions {
    /// Whether names are matched case-insensitively
    #[inline]
    pub fn ignore_case(self) -> bool {
        self.contains(Self::IGNORE_CASE)
    }

    /// Whether the expression cache is bypassed
    #[inline]
    pub fn no_cache(self) -> bool {
        self.contains(Self::NO_CACHE)
    }

    /// Whether broadcast evaluation is enabled
    #[inline]
    pub fn iterate_parameters(self) -> bool {
        self.contains(Self::ITERATE_PARAMETERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let options = EvaluateOptions::default();
        assert!(options.is_empty());
        assert!(!options.ignore_case());
    }

    #[test]
    fn test_combined_flags() {
        let options = EvaluateOptions::IGNORE_CASE | EvaluateOptions::ITERATE_PARAMETERS;
        assert!(options.ignore_case());
        assert!(options.iterate_parameters());
        assert!(!options.no_cache());
    }
}
