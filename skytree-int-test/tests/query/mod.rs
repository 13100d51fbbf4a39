mod cross_check_test;
