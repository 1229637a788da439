// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! The analysis core: GPU attribution, group filtering and the derived
//! summary views.

pub mod attribution;
pub mod capacity;
pub mod expr;
pub mod filter;
pub mod group;
pub mod table;

pub use attribution::attribute_gpus;
pub use capacity::CapacityIndex;
pub use filter::build_group_pairs;
pub use group::AnalysisGroup;
pub use table::{Cell, Table};

#[cfg(test)]
mod tests {
    //! End-to-end: raw scheduler text through parsing, attribution,
    //! filtering and the derived views.

    use super::*;
    use crate::config::{Criteria, Criterion, GroupDefinition};
    use crate::slurm::{sinfo, squeue};

    const SINFO: &str = "\
g1|gpu_std|64|256000|gpu:h200:4
g2|gpu_std|64|256000|gpu:h200:4
m1|gpu_mig|64|256000|gpu:mig_1g:8,gpu:mig_2g:4
x1|cpu_std*|56|190000|(null)
x2|cpu_std|56|190000|(null)
";

    const SQUEUE_LONG: &str = "\
1001    0     cpu=8,mem=64G,node=2,billing=8,gres/gpu=4
1002    0     cpu=4,mem=32G,node=1,billing=4,gres/gpu=2
1003    7200  cpu=4,mem=32G,node=1,gres/gpu=2
1004    600   cpu=56,mem=190000M,node=1
1005    60    cpu=2,mem=8G,node=1,gres/gpu=1
";

    const SQUEUE_SHORT: &str = "\
1001|RUNNING|None|gpu_std|alice|N/A|g[1-2]
1002|RUNNING|None|gpu_mig|bob|gres/gpu:mig_1g:2|m1
1003|PENDING|Priority|gpu_std|alice|gres/gpu:h200:2|
1004|PENDING|Resources|cpu_std|carol|N/A|
1005|PENDING|AssocGrpGRES|gpu_mig|dave|N/A|
";

    fn snapshot() -> (Vec<crate::slurm::JobRecord>, Vec<crate::slurm::NodeRecord>) {
        let nodes = sinfo::parse_sinfo(SINFO).unwrap();
        let index = CapacityIndex::build(&nodes);
        let gpu_types = capacity::gpu_types(&nodes);
        let jobs: Vec<_> = squeue::parse_queue(SQUEUE_LONG, SQUEUE_SHORT)
            .unwrap()
            .into_iter()
            .map(|job| attribute_gpus(job, &index, &gpu_types))
            .collect();
        (jobs, nodes)
    }

    fn wildcard_group() -> Vec<GroupDefinition> {
        vec![GroupDefinition {
            name: "all".to_string(),
            criteria: Criteria::default(),
        }]
    }

    #[test]
    fn attribution_covers_every_gpu_in_the_snapshot() {
        let (jobs, _) = snapshot();
        for job in &jobs {
            let attributed: f64 = job.gpu_by_type.values().sum::<f64>() + job.indeterminate_gpus;
            assert_eq!(attributed, job.gpus_total as f64, "job {}", job.job_id);
        }
        // 1001 ran on unambiguous h200 nodes; 1002 on the mixed MIG node,
        // resolved by its declared type; 1003 by declared type while
        // pending; 1005 has no usable signal at all.
        let by_id = |id: &str| jobs.iter().find(|j| j.job_id == id).unwrap();
        assert_eq!(by_id("1001").gpu_by_type["h200"], 4.0);
        assert_eq!(by_id("1002").gpu_by_type["mig_1g"], 2.0);
        assert_eq!(by_id("1003").gpu_by_type["h200"], 2.0);
        assert_eq!(by_id("1005").indeterminate_gpus, 1.0);
    }

    #[test]
    fn wildcard_group_summarises_the_whole_cluster() {
        let (jobs, nodes) = snapshot();
        let pairs = build_group_pairs(&jobs, &nodes, &wildcard_group());
        let (running, pending) = &pairs[0];

        assert_eq!(running.jobs.len(), 2);
        assert_eq!(pending.jobs.len(), 3);

        let resources: Vec<&str> = running.capacity.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(resources, vec!["cpu", "mem_gb", "h200", "mig_1g", "mig_2g"]);

        // 8 h200 GPUs total, 4 allocated by the running set.
        let h200 = running
            .allocation
            .rows
            .iter()
            .find(|row| row[0].render() == "h200")
            .unwrap();
        assert_eq!(h200[1], Cell::Int(4));
        assert_eq!(h200[2], Cell::Int(8));
        assert_eq!(h200[3], Cell::Int(50));
    }

    #[test]
    fn partition_group_narrows_capacity_and_jobs() {
        let (jobs, nodes) = snapshot();
        let defs = vec![GroupDefinition {
            name: "mig".to_string(),
            criteria: Criteria {
                partitions: Criterion::Any(vec!["gpu_mig".to_string()]),
                ..Criteria::default()
            },
        }];
        let pairs = build_group_pairs(&jobs, &nodes, &defs);
        let (running, pending) = &pairs[0];

        assert_eq!(running.jobs.len(), 1);
        assert_eq!(running.jobs[0].user, "bob");
        assert_eq!(pending.jobs.len(), 1);

        let resources: Vec<&str> = running.capacity.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(resources, vec!["cpu", "mem_gb", "mig_1g", "mig_2g"]);
    }

    #[test]
    fn pending_reasons_sort_priority_first_in_the_view() {
        let (jobs, nodes) = snapshot();
        let pairs = build_group_pairs(&jobs, &nodes, &wildcard_group());
        let (_, pending) = &pairs[0];
        let reasons: Vec<String> = pending
            .pending_by_reason
            .rows
            .iter()
            .map(|row| row[1].render())
            .collect();
        // Grouped order is by (partition, reason); both priority reasons
        // land ahead of everything else.
        assert_eq!(reasons, vec!["Resources", "Priority", "AssocGrpGRES"]);
    }
}
