// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Parallel analysis of independent packages.

use rayon::prelude::*;
use std::path::Path;

use crate::profile::Options;
use crate::report::Response;

/// Analyse every package in parallel. Each package gets its own session and workspace; the
/// responses are returned in input order.
pub fn analyze_packages<P>(paths: &[P], options: &Options) -> Vec<Response>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            log::info!("Analyzing package: package={}", path.display());
            Response::analyze_with(path, options)
        })
        .collect()
}
